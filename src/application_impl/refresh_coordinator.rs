use crate::application_port::{TokenError, TokenSource};
use crate::domain_model::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub token: AccessToken,
    pub expires_at: DateTime<Utc>,
    pub source: TokenSource,
    pub persist_error: Option<String>,
}

pub type RefreshResult = Result<RefreshedToken, TokenError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Keeps at most one refresh in flight per user and hands its outcome to
/// every caller that asked while it was running.
///
/// The refresh itself runs on its own task, so a caller that stops waiting
/// does not cancel it for the others.
#[derive(Default)]
pub struct RefreshCoordinator {
    pending: Arc<DashMap<UserId, SharedRefresh>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight refresh for `user_id`, or start one with `start`.
    /// `start` is only called when nothing is pending.
    pub async fn coordinate<F, Fut>(&self, user_id: UserId, start: F) -> RefreshResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshResult> + Send + 'static,
    {
        let mut started = false;
        let shared = self
            .pending
            .entry(user_id)
            .or_insert_with(|| {
                started = true;
                self.spawn_refresh(user_id, start())
            })
            .value()
            .clone();

        if started {
            debug!(%user_id, "started token refresh");
        } else {
            debug!(%user_id, "joined in-flight token refresh");
        }

        shared.await
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn spawn_refresh<Fut>(&self, user_id: UserId, refresh: Fut) -> SharedRefresh
    where
        Fut: Future<Output = RefreshResult> + Send + 'static,
    {
        let pending = self.pending.clone();
        let handle = tokio::spawn(async move {
            let result = refresh.await;
            pending.remove(&user_id);
            result
        });

        let pending = self.pending.clone();
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(%user_id, error = %e, "token refresh task failed");
                    pending.remove(&user_id);
                    Err(TokenError::TransientFailure(format!(
                        "refresh task failed: {e}"
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }
}
