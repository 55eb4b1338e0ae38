mod refresh_exchanger_spotify;

pub use refresh_exchanger_spotify::*;
