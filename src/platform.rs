//! Desktop integration
//!
//! The engine talks to the desktop only through the traits below, bundled in
//! a [`Platform`]. Implementations shell out to the usual Linux tools.

mod command;
mod gnome;
mod swww;
mod xdg;

#[cfg(test)]
pub mod testing;

pub use command::CommandSetter;
pub use gnome::{GnomeSetter, GsettingsTheme};
pub use swww::{ResizeMode, SwwwSetter, Transition, TransitionType};
pub use xdg::XdgFileManager;

use crate::config::{SetterBackend, SetterConfig};
use crate::datasource::Theme;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;

#[async_trait]
pub trait WallpaperSetter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn set(&self, path: &Path) -> Result<()>;

    /// Path of the wallpaper the desktop currently shows.
    async fn get(&self) -> Result<PathBuf>;
}

#[async_trait]
pub trait ThemeDetector: Send + Sync {
    async fn detect(&self) -> Theme;
}

#[async_trait]
pub trait FileManager: Send + Sync {
    /// Show the file in its containing folder.
    async fn reveal(&self, path: &Path) -> Result<()>;

    /// Open the file with the default viewer.
    async fn open(&self, path: &Path) -> Result<()>;
}

/// Desktop collaborators handed to the engine
#[derive(Clone)]
pub struct Platform {
    pub wallpaper: Arc<dyn WallpaperSetter>,
    pub theme: Arc<dyn ThemeDetector>,
    pub files: Arc<dyn FileManager>,
}

impl Platform {
    pub fn from_config(setter: &SetterConfig) -> Self {
        let wallpaper: Arc<dyn WallpaperSetter> = match setter.backend {
            SetterBackend::Swww => Arc::new(SwwwSetter::new(
                setter.transition(),
                setter.resize_mode,
            )),
            SetterBackend::Gnome => Arc::new(GnomeSetter),
            SetterBackend::Command => Arc::new(CommandSetter::new(setter.command.clone())),
        };

        Self {
            wallpaper,
            theme: Arc::new(GsettingsTheme),
            files: Arc::new(XdgFileManager),
        }
    }
}

/// Run a command to completion, failing on a non-zero exit status.
pub(crate) async fn run<I, S>(program: &str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::Io {
            context: format!("failed to run {}", program),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Io {
            context: format!("{} exited with {}", program, output.status),
            source: std::io::Error::other(stderr.trim().to_string()),
        });
    }

    Ok(output)
}
