use std::process::ExitCode;

use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = minefleet::cli::Cli::parse();
    minefleet::coordination::run(cli).await
}
