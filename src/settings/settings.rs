use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub token: Token,
    pub store: Store,
    pub spotify: Spotify,
    pub http: Http,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Token {
    pub backend: String, // "fake" or "real"
    #[serde(default = "default_refresh_buffer_secs")]
    pub refresh_buffer_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory", "mysql" or "redis"
    pub mysql_dsn: Option<String>,
    pub redis_dsn: Option<String>,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
}

#[derive(Deserialize)]
pub struct Spotify {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String, // overridden by SPOTIFY_CLIENT_SECRET
    pub token_url: String,
    pub api_base_url: String,
}

impl fmt::Debug for Spotify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spotify")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_refresh_buffer_secs() -> i64 {
    300
}

fn default_redis_prefix() -> String {
    "spotify_token".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
