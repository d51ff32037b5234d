use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use super::{Cli, Commands};
use crate::cli_cmds::*;
use crate::config::Config;
use crate::engine::{Engine, NextOptions};
use crate::platform::Platform;
use crate::{logging, watch};

pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    logging::init(config.log_level.as_deref());

    let platform = Platform::from_config(&config.setter);
    let engine = Engine::open(config, platform).await;

    match cli.command {
        Commands::Next {
            theme,
            provider,
            query,
        } => {
            let options = NextOptions {
                theme,
                provider,
                query,
            };
            cmd_next(&engine, &interruptible(), &options).await?;
        }
        Commands::Save => {
            cmd_save(&engine).await?;
        }
        Commands::Delete => {
            cmd_delete(&engine, &interruptible()).await?;
        }
        Commands::Info => {
            cmd_info(&engine).await;
        }
        Commands::Reveal => {
            cmd_reveal(&engine).await?;
        }
        Commands::Open => {
            cmd_open(&engine).await?;
        }
        Commands::Sources => {
            cmd_sources(&engine);
        }
        Commands::Watch { interval, theme } => {
            let interval = watch::parse_interval(&interval)
                .ok_or_else(|| anyhow::anyhow!("Invalid interval '{}'", interval))?;
            let watch_config = watch::WatchConfig {
                interval,
                options: NextOptions {
                    theme,
                    ..Default::default()
                },
            };
            watch::run_watch(&engine, watch_config).await?;
        }
    }

    Ok(())
}

/// Token cancelled by Ctrl+C, for one-shot commands
fn interruptible() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            child.cancel();
        }
    });
    token
}
