use super::http::{HttpClient, SLOW_TIMEOUT};
use super::{collect_queries, ImageMeta, Provider};
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const SEARCH_URL: &str = "https://wallhaven.cc/api/v1/search";

#[derive(Debug, Deserialize)]
struct WallhavenResponse {
    data: Vec<WallhavenImage>,
}

#[derive(Debug, Deserialize)]
struct WallhavenImage {
    id: String,
    url: String,
    path: String,
    dimension_x: u32,
    dimension_y: u32,
}

/// Wallhaven search API. Works without a key (SFW only); the key unlocks
/// whatever the account allows.
pub struct Wallhaven {
    http: HttpClient,
    api_key: String,
}

impl Wallhaven {
    pub fn new(api_key: String) -> Self {
        Self {
            // Wallhaven regularly takes tens of seconds to answer
            http: HttpClient::new("wallhaven", SLOW_TIMEOUT),
            api_key,
        }
    }

    async fn search_one(
        &self,
        cancel: &CancellationToken,
        query: Option<&str>,
    ) -> Result<Vec<ImageMeta>> {
        let mut params = vec![
            ("categories", "111"),
            ("purity", "100"),
            ("sorting", "random"),
            ("atleast", "1920x1080"),
        ];
        if let Some(query) = query {
            params.push(("q", query));
        }
        if !self.api_key.is_empty() {
            params.push(("apikey", self.api_key.as_str()));
        }

        let request = self.http.get(SEARCH_URL).query(&params);
        let response: WallhavenResponse = self.http.get_json(cancel, request).await?;

        Ok(response
            .data
            .into_iter()
            .map(|img| ImageMeta {
                id: img.id,
                url: img.url,
                download_url: img.path,
                width: Some(img.dimension_x),
                height: Some(img.dimension_y),
                author: None,
                source: "wallhaven".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl Provider for Wallhaven {
    fn name(&self) -> &'static str {
        "wallhaven"
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        queries: &[String],
    ) -> Result<Vec<ImageMeta>> {
        collect_queries(self.name(), cancel, queries, |q| self.search_one(cancel, q)).await
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
