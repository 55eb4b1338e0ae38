use crate::application_impl::{RefreshCoordinator, RefreshResult, RefreshedToken, TokenCache};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Tokens expiring within this window are refreshed before use.
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub refresh_buffer: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_buffer: Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS),
        }
    }
}

/// Resolves usable Spotify access tokens.
///
/// Lookup order is cache, then store, then a refresh exchange. Refreshes are
/// de-duplicated per user. A refresh that fails because the exchange service
/// is unavailable or the refresh token was rejected purges the connection;
/// any other failure leaves it in place.
pub struct RealTokenService {
    store: Arc<dyn TokenStore>,
    exchanger: Arc<dyn RefreshExchanger>,
    cache: Arc<TokenCache>,
    coordinator: RefreshCoordinator,
    config: TokenConfig,
}

impl RealTokenService {
    pub fn new(
        store: Arc<dyn TokenStore>,
        exchanger: Arc<dyn RefreshExchanger>,
        config: TokenConfig,
    ) -> Self {
        Self {
            store,
            exchanger,
            cache: Arc::new(TokenCache::new()),
            coordinator: RefreshCoordinator::new(),
            config,
        }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn refreshes_in_flight(&self) -> usize {
        self.coordinator.in_flight()
    }

    async fn refresh(
        &self,
        user_id: UserId,
        refresh_token: RefreshToken,
    ) -> Result<ResolvedToken, TokenError> {
        let store = self.store.clone();
        let exchanger = self.exchanger.clone();
        let cache = self.cache.clone();
        let buffer = self.config.refresh_buffer;

        let refreshed = self
            .coordinator
            .coordinate(user_id, move || {
                run_refresh(store, exchanger, cache, buffer, user_id, refresh_token)
            })
            .await?;

        Ok(ResolvedToken {
            token: refreshed.token,
            expires_at: refreshed.expires_at,
            source: refreshed.source,
            persist_error: refreshed.persist_error,
        })
    }
}

async fn run_refresh(
    store: Arc<dyn TokenStore>,
    exchanger: Arc<dyn RefreshExchanger>,
    cache: Arc<TokenCache>,
    buffer: Duration,
    user_id: UserId,
    refresh_token: RefreshToken,
) -> RefreshResult {
    // A refresh that settled while this caller was reading the store has
    // already spent the refresh token it is holding.
    if let Some(entry) = cache.get(user_id) {
        if entry.is_fresh(Utc::now(), buffer) {
            debug!(%user_id, "access token refreshed by a previous exchange");
            return Ok(RefreshedToken {
                token: entry.token,
                expires_at: entry.expires_at,
                source: TokenSource::Cache,
                persist_error: None,
            });
        }
    }

    info!(%user_id, "refreshing spotify access token");

    let grant = match exchanger.exchange(user_id, &refresh_token).await {
        Ok(grant) => grant,
        Err(err) => {
            let purge_connection = matches!(
                err,
                ExchangeError::ServiceUnavailable(_) | ExchangeError::InvalidGrant(_)
            );
            if purge_connection {
                warn!(%user_id, error = %err, "token refresh failed, removing spotify connection");
                purge(store.as_ref(), &cache, user_id).await;
            } else {
                warn!(%user_id, error = %err, "token refresh failed, keeping spotify connection");
            }
            return Err(TokenError::from(err));
        }
    };

    let expires_at = Duration::try_seconds(grant.expires_in_secs)
        .filter(|lifetime| *lifetime > Duration::zero())
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            warn!(
                %user_id,
                expires_in = grant.expires_in_secs,
                "refresh grant has unusable lifetime"
            );
            TokenError::TransientFailure(format!(
                "refresh grant has unusable expires_in: {}",
                grant.expires_in_secs
            ))
        })?;
    cache.set(user_id, grant.access_token.clone(), expires_at);

    let update = TokenUpdate {
        access_token: grant.access_token.clone(),
        expires_at,
        refresh_token: grant.refresh_token,
    };
    let persist_error = match store.write_token(user_id, &update).await {
        Ok(()) => None,
        Err(e) => {
            warn!(%user_id, error = %e, "refreshed token could not be persisted");
            Some(e.to_string())
        }
    };

    debug!(%user_id, %expires_at, "spotify access token refreshed");
    Ok(RefreshedToken {
        token: grant.access_token,
        expires_at,
        source: TokenSource::Refreshed,
        persist_error,
    })
}

async fn purge(store: &dyn TokenStore, cache: &TokenCache, user_id: UserId) {
    cache.clear(Some(user_id));
    if let Err(e) = store.delete_token(user_id).await {
        error!(%user_id, error = %e, "failed to delete spotify connection");
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    async fn resolve_access_token(
        &self,
        user_id: UserId,
    ) -> Result<Option<ResolvedToken>, TokenError> {
        let now = Utc::now();
        let buffer = self.config.refresh_buffer;

        if let Some(entry) = self.cache.get(user_id) {
            if entry.is_fresh(now, buffer) {
                trace!(%user_id, "access token served from cache");
                return Ok(Some(ResolvedToken {
                    token: entry.token,
                    expires_at: entry.expires_at,
                    source: TokenSource::Cache,
                    persist_error: None,
                }));
            }
        }

        let record = self.store.read_token(user_id).await.map_err(|e| {
            warn!(%user_id, error = %e, "failed to read spotify token");
            TokenError::from(e)
        })?;

        let Some(record) = record else {
            debug!(%user_id, "no spotify connection");
            return Ok(None);
        };
        let Some(access_token) = record.access_token.clone() else {
            debug!(%user_id, "spotify connection has no access token");
            return Ok(None);
        };

        if let Some(expires_at) = record.expires_at.filter(|_| record.is_fresh(now, buffer)) {
            self.cache.set(user_id, access_token.clone(), expires_at);
            return Ok(Some(ResolvedToken {
                token: access_token,
                expires_at,
                source: TokenSource::Store,
                persist_error: None,
            }));
        }

        match record.refresh_token {
            Some(refresh_token) => self.refresh(user_id, refresh_token).await.map(Some),
            None => {
                info!(%user_id, "spotify token expired and no refresh token is stored");
                Ok(None)
            }
        }
    }

    fn clear_cache(&self, user_id: Option<UserId>) {
        self.cache.clear(user_id);
    }

    async fn disconnect(&self, user_id: UserId) -> Result<(), TokenError> {
        self.cache.clear(Some(user_id));
        self.store.delete_token(user_id).await?;
        info!(%user_id, "spotify connection removed");
        Ok(())
    }
}
