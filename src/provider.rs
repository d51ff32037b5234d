//! Remote image providers
//!
//! Each gallery adapter searches for image metadata and downloads a chosen
//! image to disk. Adapters differ only in endpoint shape, auth and response
//! parsing; everything else (per-query error swallowing, filename synthesis,
//! cancellation, timeouts) lives here and in [`http`].

mod bing;
mod http;
mod pexels;
mod unsplash;
mod wallhaven;

#[cfg(test)]
pub mod testing;

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use bing::Bing;
pub use pexels::Pexels;
pub use unsplash::Unsplash;
pub use wallhaven::Wallhaven;

/// Maximum number of metadata records a single search returns.
pub const DEFAULT_LIMIT: usize = 50;

/// Names accepted by [`create_provider`].
pub const PROVIDER_NAMES: &[&str] = &["unsplash", "wallhaven", "pexels", "bing"];

/// Metadata for one remote image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMeta {
    /// Provider-scoped identifier
    pub id: String,
    /// Page a human would open to view the image
    pub url: String,
    /// Direct link to the image binary
    pub download_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub author: Option<String>,
    /// Provider name that produced this record
    pub source: String,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier, also used as the filename prefix.
    fn name(&self) -> &'static str;

    /// Search with zero or more free-text queries.
    ///
    /// Failing queries are skipped; if every query fails the result is an
    /// empty list rather than an error. Only cancellation and missing
    /// credentials are reported as errors.
    async fn search(&self, cancel: &CancellationToken, queries: &[String])
        -> Result<Vec<ImageMeta>>;

    /// Download `meta` into `destination` and return the absolute file path.
    ///
    /// When `destination` is an existing directory the file is named
    /// `<provider>_<id>.<ext>` inside it.
    async fn download(
        &self,
        cancel: &CancellationToken,
        meta: &ImageMeta,
        destination: &Path,
    ) -> Result<PathBuf>;
}

/// Build the adapter for `name`, or `None` if the name is unknown.
///
/// A `Bearer ` prefix on `auth` is stripped.
pub fn create_provider(name: &str, auth: &str) -> Option<Arc<dyn Provider>> {
    let auth = auth.trim();
    let auth = auth.strip_prefix("Bearer ").unwrap_or(auth).trim().to_string();

    match name.to_lowercase().as_str() {
        "unsplash" => Some(Arc::new(Unsplash::new(auth))),
        "wallhaven" => Some(Arc::new(Wallhaven::new(auth))),
        "pexels" => Some(Arc::new(Pexels::new(auth))),
        "bing" => Some(Arc::new(Bing::new())),
        _ => None,
    }
}

/// File extension for a download URL, `jpg` when missing or implausible.
pub fn file_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = path.rsplit('/').next().unwrap_or(path);

    match last_segment.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext
        }
        _ => "jpg",
    }
}

/// `<provider>_<id>.<ext>`
pub fn image_filename(provider: &str, meta: &ImageMeta) -> String {
    let id: String = meta
        .id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{}_{}.{}",
        provider,
        id,
        file_extension(&meta.download_url).to_lowercase()
    )
}

/// Resolve the final file path for a download.
pub fn resolve_destination(provider: &str, meta: &ImageMeta, destination: &Path) -> PathBuf {
    if destination.is_dir() {
        destination.join(image_filename(provider, meta))
    } else {
        destination.to_path_buf()
    }
}

/// Run `search_one` for every query (or once with `None` when there are no
/// queries), collecting results and skipping failures.
pub(crate) async fn collect_queries<'a, F, Fut>(
    provider: &str,
    cancel: &CancellationToken,
    queries: &'a [String],
    mut search_one: F,
) -> Result<Vec<ImageMeta>>
where
    F: FnMut(Option<&'a str>) -> Fut,
    Fut: Future<Output = Result<Vec<ImageMeta>>>,
{
    let planned: Vec<Option<&'a str>> = if queries.is_empty() {
        vec![None]
    } else {
        queries
            .iter()
            .map(|q| Some(q.trim()).filter(|q| !q.is_empty()))
            .collect()
    };

    let mut results = Vec::new();
    for query in planned {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match search_one(query).await {
            Ok(found) => results.extend(found),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::debug!(provider, query = query.unwrap_or(""), error = %e, "query failed, skipping");
            }
        }
        if results.len() >= DEFAULT_LIMIT {
            break;
        }
    }

    results.truncate(DEFAULT_LIMIT);
    Ok(results)
}
