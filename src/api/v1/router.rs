use super::handler;
use crate::domain_model::UserId;
use crate::server::*;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    // Paths are matched before methods so unknown paths reject as 404, not 405.
    let connection_status = warp::path!("connection" / UserId)
        .and(warp::get())
        .and(with(server.token_service.clone()))
        .and_then(handler::connection_status);

    let disconnect = warp::path!("connection" / UserId)
        .and(warp::delete())
        .and(with(server.token_service.clone()))
        .and_then(handler::disconnect);

    let clear_user_cache = warp::path!("connection" / UserId / "cache" / "clear")
        .and(warp::post())
        .and(with(server.token_service.clone()))
        .and_then(handler::clear_user_cache);

    let clear_all_cache = warp::path!("cache" / "clear")
        .and(warp::post())
        .and(with(server.token_service.clone()))
        .and_then(handler::clear_all_cache);

    let spotify = warp::path("spotify")
        .and(warp::path::param::<UserId>())
        .and(warp::path::tail())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with(server.api_client.clone()))
        .and_then(handler::spotify_passthrough);

    connection_status
        .or(disconnect)
        .or(clear_user_cache)
        .or(clear_all_cache)
        .or(spotify)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}
