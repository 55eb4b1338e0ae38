mod api_client_impl;
mod refresh_coordinator;
mod token_cache;
mod token_service_fake;
mod token_service_impl;

pub use api_client_impl::*;
pub use refresh_coordinator::*;
pub use token_cache::*;
pub use token_service_fake::*;
pub use token_service_impl::*;
