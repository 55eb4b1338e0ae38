#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use encore::application_impl::*;
use encore::application_port::*;
use encore::domain_model::*;
use encore::domain_port::*;
use encore::infra_memory::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Refresh exchanger with a fixed outcome that counts its calls.
pub struct ScriptedExchanger {
    calls: AtomicUsize,
    outcome: Result<RefreshGrant, ExchangeError>,
    delay: std::time::Duration,
}

impl ScriptedExchanger {
    pub fn granting(token: &str, expires_in_secs: i64) -> Self {
        Self::with_outcome(Ok(RefreshGrant {
            access_token: AccessToken(token.to_string()),
            expires_in_secs,
            refresh_token: None,
        }))
    }

    pub fn rotating(token: &str, refresh_token: &str) -> Self {
        Self::with_outcome(Ok(RefreshGrant {
            access_token: AccessToken(token.to_string()),
            expires_in_secs: 3600,
            refresh_token: Some(RefreshToken(refresh_token.to_string())),
        }))
    }

    pub fn failing(err: ExchangeError) -> Self {
        Self::with_outcome(Err(err))
    }

    fn with_outcome(outcome: Result<RefreshGrant, ExchangeError>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome,
            delay: std::time::Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshExchanger for ScriptedExchanger {
    async fn exchange(
        &self,
        _user_id: UserId,
        _refresh_token: &RefreshToken,
    ) -> Result<RefreshGrant, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// Memory store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryTokenStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn failing_writes() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }
}

#[async_trait]
impl TokenStore for FlakyStore {
    async fn read_token(&self, user_id: UserId) -> Result<Option<TokenRecord>, TokenStoreError> {
        self.inner.read_token(user_id).await
    }

    async fn write_token(
        &self,
        user_id: UserId,
        update: &TokenUpdate,
    ) -> Result<(), TokenStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TokenStoreError::Store("connection reset".into()));
        }
        self.inner.write_token(user_id, update).await
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), TokenStoreError> {
        self.inner.delete_token(user_id).await
    }
}

/// Memory store whose reads snapshot the row immediately but return after
/// a per-call delay, in call order.
pub struct LaggingReadStore {
    pub inner: MemoryTokenStore,
    read_delays: Mutex<VecDeque<std::time::Duration>>,
}

impl LaggingReadStore {
    pub fn new(read_delays: impl IntoIterator<Item = std::time::Duration>) -> Self {
        Self {
            inner: MemoryTokenStore::new(),
            read_delays: Mutex::new(read_delays.into_iter().collect()),
        }
    }
}

#[async_trait]
impl TokenStore for LaggingReadStore {
    async fn read_token(&self, user_id: UserId) -> Result<Option<TokenRecord>, TokenStoreError> {
        let snapshot = self.inner.get(user_id);
        let delay = self.read_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn write_token(
        &self,
        user_id: UserId,
        update: &TokenUpdate,
    ) -> Result<(), TokenStoreError> {
        self.inner.write_token(user_id, update).await
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), TokenStoreError> {
        self.inner.delete_token(user_id).await
    }
}

/// Wraps a token service and counts lookups.
pub struct CountingTokenService {
    pub inner: Arc<dyn TokenService>,
    resolves: AtomicUsize,
}

impl CountingTokenService {
    pub fn new(inner: Arc<dyn TokenService>) -> Self {
        Self {
            inner,
            resolves: AtomicUsize::new(0),
        }
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenService for CountingTokenService {
    async fn resolve_access_token(
        &self,
        user_id: UserId,
    ) -> Result<Option<ResolvedToken>, TokenError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve_access_token(user_id).await
    }

    fn clear_cache(&self, user_id: Option<UserId>) {
        self.inner.clear_cache(user_id)
    }

    async fn disconnect(&self, user_id: UserId) -> Result<(), TokenError> {
        self.inner.disconnect(user_id).await
    }
}

pub fn record(
    user_id: UserId,
    access: &str,
    refresh: Option<&str>,
    expires_at: DateTime<Utc>,
) -> TokenRecord {
    TokenRecord {
        user_id,
        access_token: Some(AccessToken(access.to_string())),
        refresh_token: refresh.map(|r| RefreshToken(r.to_string())),
        expires_at: Some(expires_at),
    }
}

pub fn in_minutes(minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(minutes)
}

pub fn service(
    store: Arc<dyn TokenStore>,
    exchanger: Arc<dyn RefreshExchanger>,
) -> Arc<RealTokenService> {
    Arc::new(RealTokenService::new(store, exchanger, TokenConfig::default()))
}
