//! In-memory provider for tests.

use super::{resolve_destination, ImageMeta, Provider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct FakeProvider {
    name: &'static str,
    results: Vec<ImageMeta>,
    fail: bool,
    delay: Option<Duration>,
    searches: Mutex<Vec<Vec<String>>>,
    downloads: AtomicUsize,
}

impl FakeProvider {
    /// Provider returning `count` images with ids `<name>-0..count`.
    pub fn new(name: &'static str, count: usize) -> Self {
        let results = (0..count)
            .map(|i| ImageMeta {
                id: format!("{}-{}", name, i),
                url: format!("https://{}.test/view/{}", name, i),
                download_url: format!("https://{}.test/img/{}.jpg", name, i),
                width: Some(1920),
                height: Some(1080),
                author: None,
                source: name.to_string(),
            })
            .collect();
        Self {
            name,
            results,
            fail: false,
            delay: None,
            searches: Mutex::new(Vec::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Provider whose searches always fail.
    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, 0)
        }
    }

    /// Make every search take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn search_calls(&self) -> Vec<Vec<String>> {
        self.searches.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        queries: &[String],
    ) -> Result<Vec<ImageMeta>> {
        self.searches.lock().unwrap().push(queries.to_vec());
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::provider(self.name, "search returned HTTP 503"));
        }
        Ok(self.results.clone())
    }

    async fn download(
        &self,
        _cancel: &CancellationToken,
        meta: &ImageMeta,
        destination: &Path,
    ) -> Result<PathBuf> {
        let path = resolve_destination(self.name, meta, destination);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io("create", parent, e))?;
        }
        std::fs::write(&path, meta.id.as_bytes()).map_err(|e| Error::io("write", &path, e))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(std::path::absolute(&path).unwrap_or(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_returns_absolute_path() {
        let provider = FakeProvider::new("fake", 1);
        let meta = provider.results[0].clone();
        let dir = PathBuf::from("target").join("fake-provider-download");
        let relative = dir.join("out.jpg");

        let path = provider
            .download(&CancellationToken::new(), &meta, &relative)
            .await
            .unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with(&relative));
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
