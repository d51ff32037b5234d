use crate::engine::{Engine, NextOptions};
use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Watch loop configuration
pub struct WatchConfig {
    pub interval: Duration,
    pub options: NextOptions,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60), // 30 minutes
            options: NextOptions::default(),
        }
    }
}

/// Parse interval string like "30m", "1h", "90s"
pub fn parse_interval(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();

    let secs = if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok()?.checked_mul(60)?
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.trim().parse::<u64>().ok()?.checked_mul(3600)?
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok()?
    } else {
        // Plain number = minutes
        s.parse::<u64>().ok()?.checked_mul(60)?
    };

    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Rotate now, then every interval until Ctrl+C.
///
/// A failed rotation is reported and retried at the next tick.
pub async fn run_watch(engine: &Engine, watch_config: WatchConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    ctrlc_handler(cancel.clone());

    println!("wallrotate watch");
    println!("   Interval:  {} seconds", watch_config.interval.as_secs());
    println!("   Sources:   {}", engine.describe_sources().len());
    println!("\nRunning... (Ctrl+C to stop)\n");

    loop {
        match engine.next(&cancel, &watch_config.options).await {
            Ok(image) => println!("✓ {} ({})", image.path.display(), image.source_id),
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                tracing::warn!(error = %e, "rotation failed");
                eprintln!("⚠ {}", e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(watch_config.interval) => {}
        }
    }

    println!("\nShutting down...");
    // The first Ctrl+C already fired; a second one abandons pending downloads
    let abort = CancellationToken::new();
    ctrlc_handler(abort.clone());
    engine.finish_prefetch(&abort).await;
    Ok(())
}

/// Cancel `token` on Ctrl+C
fn ctrlc_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            token.cancel();
        }
    });
}
