//! Global `tracing` subscriber with a filter that can be swapped once settings
//! are loaded. See `bin/token_demo.rs` for a binary exercising it.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
