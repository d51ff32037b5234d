use super::{run, WallpaperSetter};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// User-provided command; the image path is appended as the last argument,
/// e.g. `["feh", "--bg-fill"]`.
pub struct CommandSetter {
    command: Vec<String>,
}

impl CommandSetter {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl WallpaperSetter for CommandSetter {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn set(&self, path: &Path) -> Result<()> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(Error::NotConfigured(
                "setter.command is empty".to_string(),
            ));
        };

        let mut argv: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        argv.push(path.as_os_str());
        run(program, argv).await?;
        Ok(())
    }

    async fn get(&self) -> Result<PathBuf> {
        Err(Error::NotConfigured(
            "the command backend cannot report the current wallpaper".to_string(),
        ))
    }
}
