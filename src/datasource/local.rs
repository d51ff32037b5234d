use super::{Image, Theme};
use crate::error::{Error, Result};
use crate::utils::is_image_file;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// A directory of wallpapers on disk
#[derive(Debug, Clone)]
pub struct LocalSource {
    id: String,
    root: PathBuf,
    recursive: bool,
    theme: Theme,
}

impl LocalSource {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>, recursive: bool, theme: Theme) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            recursive,
            theme,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn description(&self) -> String {
        format!(
            "{} ({}{})",
            self.id,
            self.root.display(),
            if self.recursive { ", recursive" } else { "" }
        )
    }

    /// All supported images under the root, sorted by path.
    pub fn list_images(&self, cancel: &CancellationToken) -> Result<Vec<Image>> {
        if !self.root.is_dir() {
            return Err(Error::NotFound(format!(
                "wallpaper directory {}",
                self.root.display()
            )));
        }

        let mut walker = WalkDir::new(&self.root).follow_links(true);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut images = Vec::new();
        for entry in walker {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(source = %self.id, error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_file() && is_image_file(entry.path()) {
                let path = std::path::absolute(entry.path())
                    .unwrap_or_else(|_| entry.path().to_path_buf());
                images.push(Image::local(path, &self.id, self.theme));
            }
        }

        images.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(images)
    }
}
