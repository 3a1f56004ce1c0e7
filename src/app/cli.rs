use std::path::PathBuf;

use clap::Parser;

/// cloudplay - search, stream and play tracks with synced lyrics
#[derive(Parser, Debug)]
#[command(name = "cloudplay", version, about)]
pub struct Args {
    /// Hand playback to the system's default audio application
    #[arg(long, short = 'e')]
    pub external: bool,

    /// Use this config file instead of the default location
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Print the default config.toml to stdout and exit
    #[arg(long)]
    pub generate_config: bool,
}
