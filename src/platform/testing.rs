//! Recording collaborators for engine tests.

use super::{FileManager, Platform, ThemeDetector, WallpaperSetter};
use crate::datasource::Theme;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeSetter {
    pub applied: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl WallpaperSetter for FakeSetter {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn set(&self, path: &Path) -> Result<()> {
        self.applied.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn get(&self) -> Result<PathBuf> {
        self.applied
            .lock()
            .unwrap()
            .last()
            .cloned()
            .ok_or_else(|| Error::NotFound("no wallpaper applied".to_string()))
    }
}

pub struct FixedTheme(pub Theme);

#[async_trait]
impl ThemeDetector for FixedTheme {
    async fn detect(&self) -> Theme {
        self.0
    }
}

#[derive(Default)]
pub struct FakeFiles {
    pub revealed: Mutex<Vec<PathBuf>>,
    pub opened: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl FileManager for FakeFiles {
    async fn reveal(&self, path: &Path) -> Result<()> {
        self.revealed.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn open(&self, path: &Path) -> Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Fake platform plus handles to inspect what it was asked to do.
pub fn fake_platform(theme: Theme) -> (Platform, Arc<FakeSetter>, Arc<FakeFiles>) {
    let setter = Arc::new(FakeSetter::default());
    let files = Arc::new(FakeFiles::default());
    let platform = Platform {
        wallpaper: setter.clone(),
        theme: Arc::new(FixedTheme(theme)),
        files: files.clone(),
    };
    (platform, setter, files)
}
