mod cli;
mod cli_cmds;
mod config;
mod datasource;
mod engine;
mod error;
mod logging;
mod platform;
mod provider;
mod state;
mod utils;
mod watch;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
