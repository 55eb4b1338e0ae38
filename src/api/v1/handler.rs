use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        ApiEnvelope {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiEnvelope {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub user_id: UserId,
    pub connected: bool,
}

pub async fn connection_status(
    user_id: UserId,
    token_service: Arc<dyn TokenService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let connected = token_service.has_valid_connection(user_id).await;
    Ok(warp::reply::json(&ApiEnvelope::ok(ConnectionStatus {
        user_id,
        connected,
    })))
}

pub async fn disconnect(
    user_id: UserId,
    token_service: Arc<dyn TokenService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    token_service
        .disconnect(user_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiEnvelope::ok(ConnectionStatus {
        user_id,
        connected: false,
    })))
}

pub async fn clear_user_cache(
    user_id: UserId,
    token_service: Arc<dyn TokenService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    token_service.clear_cache(Some(user_id));
    Ok(warp::reply::json(&ApiEnvelope::ok(())))
}

pub async fn clear_all_cache(
    token_service: Arc<dyn TokenService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    token_service.clear_cache(None);
    Ok(warp::reply::json(&ApiEnvelope::ok(())))
}

/// Forward a GET to the Spotify Web API as the given user. Status and body
/// come back untouched.
pub async fn spotify_passthrough(
    user_id: UserId,
    tail: warp::path::Tail,
    query: HashMap<String, String>,
    api_client: Arc<dyn ApiClient>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let options = query
        .into_iter()
        .fold(RequestOptions::get(), |options, (k, v)| options.with_query(k, v));

    let response = api_client
        .request(user_id, tail.as_str(), options)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok(warp::reply::with_status(
        warp::reply::with_header(response.body, "content-type", "application/json"),
        status,
    ))
}
