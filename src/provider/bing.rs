use super::http::{HttpClient, DEFAULT_TIMEOUT};
use super::{ImageMeta, Provider};
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const BASE_URL: &str = "https://www.bing.com";

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    images: Vec<ArchiveImage>,
}

#[derive(Debug, Deserialize)]
struct ArchiveImage {
    urlbase: String,
    #[serde(default)]
    copyright: Option<String>,
    #[serde(default)]
    copyrightlink: Option<String>,
}

impl From<ArchiveImage> for ImageMeta {
    fn from(image: ArchiveImage) -> Self {
        // "/th?id=OHR.Foo_EN-US123" -> "OHR.Foo_EN-US123"
        let id = image
            .urlbase
            .split_once("id=")
            .map(|(_, id)| id.to_string())
            .unwrap_or_else(|| image.urlbase.trim_start_matches('/').to_string());

        ImageMeta {
            url: image
                .copyrightlink
                .unwrap_or_else(|| format!("{}{}", BASE_URL, image.urlbase)),
            download_url: format!("{}{}_UHD.jpg", BASE_URL, image.urlbase),
            id,
            width: None,
            height: None,
            author: image.copyright,
            source: "bing".to_string(),
        }
    }
}

/// Bing image of the day archive. Queries are ignored; the archive only
/// exposes the last eight daily images.
pub struct Bing {
    http: HttpClient,
}

impl Bing {
    pub fn new() -> Self {
        Self {
            http: HttpClient::new("bing", DEFAULT_TIMEOUT),
        }
    }
}

impl Default for Bing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for Bing {
    fn name(&self) -> &'static str {
        "bing"
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        _queries: &[String],
    ) -> Result<Vec<ImageMeta>> {
        let request = self
            .http
            .get(&format!("{}/HPImageArchive.aspx", BASE_URL))
            .query(&[("format", "js"), ("idx", "0"), ("n", "8"), ("mkt", "en-US")]);

        match self.http.get_json::<ArchiveResponse>(cancel, request).await {
            Ok(response) => Ok(response.images.into_iter().map(ImageMeta::from).collect()),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "bing archive request failed");
                Ok(Vec::new())
            }
        }
    }

    async fn download(
        &self,
        cancel: &CancellationToken,
        meta: &ImageMeta,
        destination: &Path,
    ) -> Result<PathBuf> {
        self.http.download_image(cancel, meta, destination).await
    }
}
