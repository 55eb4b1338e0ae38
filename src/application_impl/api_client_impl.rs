use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use reqwest::StatusCode;
use std::sync::Arc;

pub const SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Calls the Spotify Web API on behalf of a user.
///
/// A 401 clears the cached token (the store row is kept) and the call is
/// retried exactly once with a freshly resolved token.
pub struct AuthenticatedApiClient {
    http: reqwest::Client,
    base_url: String,
    token_service: Arc<dyn TokenService>,
}

impl AuthenticatedApiClient {
    pub fn new(token_service: Arc<dyn TokenService>, base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), token_service, base_url)
    }

    pub fn with_client(
        http: reqwest::Client,
        token_service: Arc<dyn TokenService>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token_service,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn resolve_token(&self, user_id: UserId) -> Result<AccessToken, ApiClientError> {
        self.token_service
            .get_access_token(user_id)
            .await?
            .ok_or(ApiClientError::NoToken)
    }

    async fn send(
        &self,
        token: &AccessToken,
        path: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiClientError> {
        let mut request = self
            .http
            .request(options.method.clone(), self.url(path))
            .bearer_auth(token.as_str());
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.json {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiClientError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiClientError::Transport(e.to_string()))?;

        Ok(ApiResponse { status, body })
    }
}

#[async_trait::async_trait]
impl ApiClient for AuthenticatedApiClient {
    async fn request(
        &self,
        user_id: UserId,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiClientError> {
        let token = self.resolve_token(user_id).await?;
        let response = self.send(&token, path, &options).await?;
        if response.status != StatusCode::UNAUTHORIZED.as_u16() {
            return Ok(response);
        }

        info!(%user_id, path, "spotify rejected access token, retrying once");
        self.token_service.clear_cache(Some(user_id));

        let token = self.resolve_token(user_id).await?;
        let response = self.send(&token, path, &options).await?;
        if response.status == StatusCode::UNAUTHORIZED.as_u16() {
            warn!(%user_id, path, "spotify still unauthorized after retry");
            return Err(ApiClientError::RequestUnauthorized(response));
        }

        Ok(response)
    }
}
