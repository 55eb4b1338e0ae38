// store

mod token_store;

pub use token_store::*;

// remote

mod refresh_exchanger;

pub use refresh_exchanger::*;
