use super::{run, FileManager};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;

/// Opens files and folders through `xdg-open`
pub struct XdgFileManager;

#[async_trait]
impl FileManager for XdgFileManager {
    async fn reveal(&self, path: &Path) -> Result<()> {
        let folder = path
            .parent()
            .ok_or_else(|| Error::NotFound(format!("parent folder of {}", path.display())))?;
        run("xdg-open", [folder]).await?;
        Ok(())
    }

    async fn open(&self, path: &Path) -> Result<()> {
        run("xdg-open", [path]).await?;
        Ok(())
    }
}
