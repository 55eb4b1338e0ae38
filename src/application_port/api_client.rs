use crate::application_port::TokenError;
use crate::domain_model::UserId;
use reqwest::Method;

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            query: Vec::new(),
            json: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// Raw third-party response. Bodies are passed through uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("no token available")]
    NoToken,
    #[error(transparent)]
    Token(#[from] TokenError),
    /// Still 401 after one refresh and retry. Carries the final response as-is.
    #[error("request unauthorized after retry (status {})", .0.status)]
    RequestUnauthorized(ApiResponse),
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    async fn request(
        &self,
        user_id: UserId,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiClientError>;
}
