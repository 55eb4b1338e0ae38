use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use chrono::Duration;
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct Server {
    pub token_service: Arc<dyn TokenService>,
    pub api_client: Arc<dyn ApiClient>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut pool = None;

        let token_store: Arc<dyn TokenStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemoryTokenStore::new()),
            "mysql" => {
                let dsn = settings
                    .store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.mysql_dsn is required for the mysql backend"))?;
                let mysql_pool = Pool::<MySql>::connect(dsn).await?;
                pool = Some(mysql_pool.clone());
                Arc::new(MySqlTokenStore::new(mysql_pool))
            }
            "redis" => {
                let dsn = settings
                    .store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.redis_dsn is required for the redis backend"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisTokenStore::new(
                    redis_manager,
                    settings.store.redis_prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .unwrap_or_else(|_| settings.spotify.client_secret.clone());
        let exchanger: Arc<dyn RefreshExchanger> =
            Arc::new(SpotifyRefreshExchanger::new(SpotifyExchangerConfig {
                token_url: settings.spotify.token_url.clone(),
                client_id: settings.spotify.client_id.clone(),
                client_secret,
            }));

        let token_service: Arc<dyn TokenService> = match settings.token.backend.as_str() {
            "fake" => Arc::new(FakeTokenService::new()),
            "real" => Arc::new(RealTokenService::new(
                token_store,
                exchanger,
                TokenConfig {
                    refresh_buffer: Duration::seconds(settings.token.refresh_buffer_secs),
                },
            )),
            other => return Err(anyhow!("Unknown token backend: {}", other)),
        };

        let api_client: Arc<dyn ApiClient> = Arc::new(AuthenticatedApiClient::new(
            token_service.clone(),
            settings.spotify.api_base_url.clone(),
        ));

        info!(
            store = %settings.store.backend,
            token = %settings.token.backend,
            "server started"
        );

        Ok(Self {
            token_service,
            api_client,
            pool,
        })
    }

    /// Assemble a server from already built services.
    pub fn from_parts(token_service: Arc<dyn TokenService>, api_client: Arc<dyn ApiClient>) -> Self {
        Self {
            token_service,
            api_client,
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.token_service.clear_cache(None);
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
