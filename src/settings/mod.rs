//! TOML settings loaded through `config`, with the path taken from `--settings`.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
