use super::{resolve_destination, ImageMeta};
use crate::error::{Error, Result};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Total timeout for a provider request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for galleries whose backend is known to be slow.
pub const SLOW_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client shared by one provider adapter.
pub struct HttpClient {
    client: reqwest::Client,
    provider: &'static str,
}

impl HttpClient {
    pub fn new(provider: &'static str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(format!("wallrotate/{}", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            provider,
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send `request` and decode a JSON body, failing on non-2xx status.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = cancellable(cancel, request.send())
            .await?
            .map_err(|e| self.request_error("search request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(
                self.provider,
                format!("search returned HTTP {}", status),
            ));
        }

        cancellable(cancel, response.json::<T>())
            .await?
            .map_err(|e| self.request_error("failed to decode search response", e))
    }

    /// Download `meta` into `destination` (a directory or a file path).
    pub async fn download_image(
        &self,
        cancel: &CancellationToken,
        meta: &ImageMeta,
        destination: &Path,
    ) -> Result<PathBuf> {
        let path = resolve_destination(self.provider, meta, destination);
        self.download(cancel, &meta.download_url, &path).await?;
        Ok(std::path::absolute(&path).unwrap_or(path))
    }

    /// Fetch `url` and write the body to `dest`, creating parent directories.
    pub async fn download(&self, cancel: &CancellationToken, url: &str, dest: &Path) -> Result<()> {
        let response = cancellable(cancel, self.client.get(url).send())
            .await?
            .map_err(|e| self.request_error("download failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(
                self.provider,
                format!("download returned HTTP {}", status),
            ));
        }

        let bytes = cancellable(cancel, response.bytes())
            .await?
            .map_err(|e| self.request_error("failed to read image data", e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io("failed to create", parent, e))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| Error::io("failed to write", dest, e))?;

        Ok(())
    }

    fn request_error(&self, what: &str, err: reqwest::Error) -> Error {
        Error::provider(self.provider, format!("{}: {}", what, err))
    }
}

/// Race `fut` against the cancellation token.
pub async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        out = fut => Ok(out),
    }
}
