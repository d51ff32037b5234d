use anyhow::{Context, Result};

use crate::engine::Engine;

pub async fn cmd_info(engine: &Engine) {
    let Some(info) = engine.info() else {
        println!("No wallpaper set yet. Run 'wallrotate next'.");
        return;
    };

    let current = &info.current;
    println!("Path:    {}", current.path.display());
    println!("Source:  {}", current.source_id);
    println!("Theme:   {}", current.theme);
    println!("Set at:  {}", current.set_at.to_rfc3339());
    println!("Saved:   {}", if current.is_temp { "no" } else { "yes" });
    if !current.query.is_empty() {
        println!("Query:   {}", current.query);
    }
    if !info.exists {
        println!("⚠ File no longer exists");
    }

    match engine.desktop_wallpaper().await {
        Ok(shown) if shown != current.path => {
            println!("⚠ Desktop shows {}", shown.display());
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "could not query the desktop wallpaper"),
    }
}

pub async fn cmd_reveal(engine: &Engine) -> Result<()> {
    let path = engine
        .reveal_current()
        .await
        .context("Failed to reveal the current wallpaper")?;
    println!("{}", path.display());
    Ok(())
}

pub async fn cmd_open(engine: &Engine) -> Result<()> {
    let path = engine
        .open_current()
        .await
        .context("Failed to open the current wallpaper")?;
    println!("{}", path.display());
    Ok(())
}

pub fn cmd_sources(engine: &Engine) {
    let lines = engine.describe_sources();
    if lines.is_empty() {
        println!("No sources configured.");
        println!("Add [[themes.<light|dark>.local]] or [[themes.<light|dark>.remote]] entries to the config.");
        return;
    }

    for (theme, line) in lines {
        println!("{:<5}  {}", theme.as_str(), line);
    }
}
