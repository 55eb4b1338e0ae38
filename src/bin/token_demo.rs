//! Runs the token service against an in-memory store and a slow stand-in for
//! the Spotify accounts service, showing refresh de-duplication and purging.
//!
//! $ cargo run --bin token_demo

use chrono::{Duration, Utc};
use encore::application_impl::*;
use encore::application_port::*;
use encore::domain_model::*;
use encore::domain_port::*;
use encore::infra_memory::*;
use encore::logger::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct SlowExchanger {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl RefreshExchanger for SlowExchanger {
    async fn exchange(
        &self,
        _user_id: UserId,
        refresh_token: &RefreshToken,
    ) -> Result<RefreshGrant, ExchangeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        if refresh_token.as_str() == "revoked" {
            return Err(ExchangeError::InvalidGrant("Refresh token revoked".into()));
        }
        Ok(RefreshGrant {
            access_token: AccessToken(format!("demo-access-{n}")),
            expires_in_secs: 3600,
            refresh_token: None,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "encore=debug,info".to_string(),
    })?;

    let store = Arc::new(MemoryTokenStore::new());
    let exchanger = Arc::new(SlowExchanger {
        calls: AtomicUsize::new(0),
    });
    let service = Arc::new(RealTokenService::new(
        store.clone(),
        exchanger.clone(),
        TokenConfig::default(),
    ));

    let artist = UserId::new_v4();
    store.insert(TokenRecord {
        user_id: artist,
        access_token: Some(AccessToken("expiring".into())),
        refresh_token: Some(RefreshToken("valid".into())),
        expires_at: Some(Utc::now() + Duration::minutes(2)),
    });

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_access_token(artist).await })
        })
        .collect();
    for handle in handles {
        let token = handle.await??;
        info!(?token, "resolved");
    }
    info!(
        exchanges = exchanger.calls.load(Ordering::SeqCst),
        "10 concurrent lookups done"
    );

    let revoked = UserId::new_v4();
    store.insert(TokenRecord {
        user_id: revoked,
        access_token: Some(AccessToken("stale".into())),
        refresh_token: Some(RefreshToken("revoked".into())),
        expires_at: Some(Utc::now() - Duration::minutes(1)),
    });
    let result = service.get_access_token(revoked).await;
    info!(?result, "revoked refresh token");
    info!(
        connected = service.has_valid_connection(revoked).await,
        row_present = store.get(revoked).is_some(),
        "after purge"
    );

    Ok(())
}
