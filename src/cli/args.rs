use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::datasource::Theme;

#[derive(Parser)]
#[command(name = "wallrotate")]
#[command(version)]
#[command(about = "Rotate wallpapers from local folders and online galleries")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Config file (defaults to the user config dir, or $WALLROTATE_CONFIG)
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Switch to a new wallpaper
    Next {
        /// Force a theme instead of following the desktop
        #[arg(short, long)]
        theme: Option<Theme>,

        /// Use only this provider ("local" for local folders)
        #[arg(short, long)]
        provider: Option<String>,

        /// Search query for remote providers
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Keep the current downloaded wallpaper
    Save,
    /// Delete the current downloaded wallpaper and switch to another
    Delete,
    /// Show the current wallpaper
    Info,
    /// Show the current wallpaper in the file manager
    Reveal,
    /// Open the current wallpaper in the image viewer
    Open,
    /// List configured sources
    Sources,
    /// Rotate wallpapers on an interval until stopped
    Watch {
        /// Rotation interval (e.g., "30m", "1h", "90s")
        #[arg(short, long, default_value = "30m")]
        interval: String,

        /// Force a theme instead of following the desktop
        #[arg(short, long)]
        theme: Option<Theme>,
    },
}
