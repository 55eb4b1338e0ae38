use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use reqwest::StatusCode;
use serde::Deserialize;

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct SpotifyExchangerConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// `grant_type=refresh_token` exchange against the Spotify accounts service.
pub struct SpotifyRefreshExchanger {
    http: reqwest::Client,
    config: SpotifyExchangerConfig,
}

impl SpotifyRefreshExchanger {
    pub fn new(config: SpotifyExchangerConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: SpotifyExchangerConfig) -> Self {
        Self { http, config }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Map a non-success token endpoint response onto an [`ExchangeError`].
///
/// The endpoint being down or missing (5xx, 404) is `ServiceUnavailable`; an
/// OAuth `invalid_grant` is `InvalidGrant`; everything else, rate limiting
/// included, is `Other` so the connection survives.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> ExchangeError {
    if status.is_server_error() || status == StatusCode::NOT_FOUND {
        return ExchangeError::ServiceUnavailable(format!("token endpoint returned {status}"));
    }

    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(err) if err.error == "invalid_grant" => {
            ExchangeError::InvalidGrant(err.error_description.unwrap_or(err.error))
        }
        Ok(err) => ExchangeError::Other(format!(
            "{status}: {}{}",
            err.error,
            err.error_description
                .map(|d| format!(" ({d})"))
                .unwrap_or_default()
        )),
        Err(_) => ExchangeError::Other(format!("token endpoint returned {status}")),
    }
}

#[async_trait::async_trait]
impl RefreshExchanger for SpotifyRefreshExchanger {
    async fn exchange(
        &self,
        user_id: UserId,
        refresh_token: &RefreshToken,
    ) -> Result<RefreshGrant, ExchangeError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| ExchangeError::Other(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &body);
            debug!(%user_id, %status, error = %err, "token endpoint rejected refresh");
            return Err(err);
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::Other(format!("malformed token response: {e}")))?;
        if body.expires_in <= 0 {
            return Err(ExchangeError::Other(format!(
                "token response has non-positive expires_in: {}",
                body.expires_in
            )));
        }

        Ok(RefreshGrant {
            access_token: AccessToken(body.access_token),
            expires_in_secs: body.expires_in,
            refresh_token: body.refresh_token.map(RefreshToken),
        })
    }
}
