use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::datasource::Image;
use crate::engine::{Engine, NextOptions};

fn print_image(image: &Image) {
    println!("{}", image.path.display());
    if !image.is_local {
        if !image.query.is_empty() {
            println!("  query: {}", image.query);
        }
        if let Some(url) = &image.url {
            println!("  url:   {}", url);
        }
    }
}

async fn wait_for_prefetch(engine: &Engine, cancel: &CancellationToken) {
    if !engine.finish_prefetch(cancel).await {
        tracing::debug!("interrupted while waiting for background downloads");
    }
}

pub async fn cmd_next(
    engine: &Engine,
    cancel: &CancellationToken,
    options: &NextOptions,
) -> Result<()> {
    let image = engine
        .next(cancel, options)
        .await
        .context("Failed to set a new wallpaper")?;
    print_image(&image);

    // Let the background download finish so the next call can use it
    wait_for_prefetch(engine, cancel).await;
    Ok(())
}

pub async fn cmd_save(engine: &Engine) -> Result<()> {
    let path = engine
        .save_current()
        .await
        .context("Failed to save the current wallpaper")?;
    println!("✓ Saved to {}", path.display());
    Ok(())
}

pub async fn cmd_delete(engine: &Engine, cancel: &CancellationToken) -> Result<()> {
    let image = engine
        .delete_current(cancel)
        .await
        .context("Failed to delete the current wallpaper")?;
    println!("✓ Deleted; now showing:");
    print_image(&image);

    wait_for_prefetch(engine, cancel).await;
    Ok(())
}
