use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "minefleet", about = "Simulated cloud-mining session fleet", version)]
pub struct Cli {
    /// Secrets file: one wallet secret per line. Blank lines and lines
    /// starting with '#' are ignored.
    #[arg(long, default_value = "secrets.txt")]
    pub secrets: PathBuf,

    /// Proxy file: one scheme://[user:pass@]host:port per line, assigned
    /// to secrets round-robin. Omit to run every session directly.
    #[arg(long)]
    pub proxies: Option<PathBuf>,

    /// State directory for session files and config.
    /// Defaults to $MINEFLEET_STATE_DIR or ~/.minefleet.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Config file path. Defaults to <state-dir>/config.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable per-request and per-attempt diagnostics.
    #[arg(short, long)]
    pub verbose: bool,
}
