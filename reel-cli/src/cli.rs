use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "reel",
    author,
    version,
    about = "Scroll a short-video feed from the terminal",
    long_about = "Drives a feed session over simulated media elements. Fetches the feed from \
                  the API server, or generates a demo feed with --offline.\n\n\
                  Keys: Up/Down or k/j to scroll, m mute, l like, r retry, p products, \
                  s status, q quit."
)]
pub struct Args {
    /// Config file (TOML). Defaults to the platform config directory.
    #[arg(short, long, env = "REEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// API origin, overriding the config file.
    #[arg(long, env = "REEL_API_URL")]
    pub api_url: Option<String>,

    /// Collection path, overriding the config file.
    #[arg(long)]
    pub collection: Option<String>,

    /// Generate a local demo feed instead of contacting the API.
    #[arg(long)]
    pub offline: bool,

    /// Number of items in the offline demo feed.
    #[arg(long, default_value_t = 12, requires = "offline")]
    pub items: usize,

    /// Where the device id is stored. Defaults to the platform data directory.
    #[arg(long)]
    pub device_file: Option<PathBuf>,

    /// Simulated time for play() to resolve.
    #[arg(long, default_value_t = 120)]
    pub play_latency_ms: u64,

    /// Positions whose first two play attempts are rejected.
    #[arg(long = "reject", value_name = "INDEX")]
    pub reject: Vec<usize>,

    /// Positions whose media fails to load.
    #[arg(long = "broken", value_name = "INDEX")]
    pub broken: Vec<usize>,

    /// Step through the feed without a keyboard, then exit.
    #[arg(long, value_name = "N")]
    pub steps: Option<usize>,

    /// Time spent on each item in --steps mode.
    #[arg(long, default_value_t = 1500)]
    pub dwell_ms: u64,

    /// Print feed events as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose (debug) logging.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long)]
    pub quiet: bool,
}
