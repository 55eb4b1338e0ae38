mod api_client;
mod token_service;

pub use api_client::*;
pub use token_service::*;
