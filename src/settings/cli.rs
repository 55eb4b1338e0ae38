use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Spotify token lifecycle service")]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(long)]
    pub settings: Option<String>,
}
