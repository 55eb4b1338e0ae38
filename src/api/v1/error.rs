use crate::api::v1::handler::ApiEnvelope;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiErrorCode>() {
        let json = warp::reply::json(&ApiEnvelope::<()>::err(err.clone(), err.to_string()));
        Ok(warp::reply::with_status(json, StatusCode::OK))
    } else if err.is_not_found() {
        let json = warp::reply::json(&ApiEnvelope::<()>::err(
            ApiErrorCode::NotFound,
            ApiErrorCode::NotFound.to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND))
    } else {
        let json = warp::reply::json(&ApiEnvelope::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Spotify is not connected")]
    NotConnected,
    #[error("Spotify connection is no longer valid, reconnect required")]
    ConnectionInvalid,
    #[error("Spotify token service is unavailable")]
    ServiceUnavailable,
    #[error("Spotify rejected the request")]
    Unauthorized,
    #[error("Spotify could not be reached")]
    Upstream,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<TokenError> for ApiErrorCode {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::ServiceUnavailable(_) => ApiErrorCode::ServiceUnavailable,
            TokenError::InvalidConnection(_) => ApiErrorCode::ConnectionInvalid,
            TokenError::TransientFailure(e) => {
                warn!("Transient token failure: {}", e);
                ApiErrorCode::Upstream
            }
            TokenError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<ApiClientError> for ApiErrorCode {
    fn from(error: ApiClientError) -> Self {
        match error {
            ApiClientError::NoToken => ApiErrorCode::NotConnected,
            ApiClientError::Token(e) => ApiErrorCode::from(e),
            ApiClientError::RequestUnauthorized(_) => ApiErrorCode::Unauthorized,
            ApiClientError::Transport(e) => {
                warn!("Spotify transport error: {}", e);
                ApiErrorCode::Upstream
            }
        }
    }
}
