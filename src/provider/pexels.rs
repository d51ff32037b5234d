use super::http::{HttpClient, DEFAULT_TIMEOUT};
use super::{collect_queries, ImageMeta, Provider, DEFAULT_LIMIT};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const API_BASE: &str = "https://api.pexels.com/v1";

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    id: u64,
    width: u32,
    height: u32,
    url: String,
    photographer: Option<String>,
    src: PexelsSrc,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    original: String,
}

pub struct Pexels {
    http: HttpClient,
    api_key: String,
}

impl Pexels {
    pub fn new(api_key: String) -> Self {
        Self {
            http: HttpClient::new("pexels", DEFAULT_TIMEOUT),
            api_key,
        }
    }

    async fn search_one(
        &self,
        cancel: &CancellationToken,
        query: Option<&str>,
    ) -> Result<Vec<ImageMeta>> {
        let per_page = DEFAULT_LIMIT.to_string();
        let request = match query {
            Some(query) => self.http.get(&format!("{}/search", API_BASE)).query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", "landscape"),
            ]),
            // Curated feed when there is nothing to search for
            None => self
                .http
                .get(&format!("{}/curated", API_BASE))
                .query(&[("per_page", per_page.as_str())]),
        };
        let request = request.header("Authorization", self.api_key.as_str());

        let response: PexelsResponse = self.http.get_json(cancel, request).await?;
        Ok(response
            .photos
            .into_iter()
            .map(|photo| ImageMeta {
                id: photo.id.to_string(),
                url: photo.url,
                download_url: photo.src.original,
                width: Some(photo.width),
                height: Some(photo.height),
                author: photo.photographer,
                source: "pexels".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl Provider for Pexels {
    fn name(&self) -> &'static str {
        "pexels"
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        queries: &[String],
    ) -> Result<Vec<ImageMeta>> {
        if self.api_key.is_empty() {
            return Err(Error::NotConfigured("pexels requires an API key".to_string()));
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "page": 1,
            "photos": [{
                "id": 2014422,
                "width": 3024,
                "height": 3024,
                "url": "https://www.pexels.com/photo/2014422/",
                "photographer": "Joey Farina",
                "src": {"original": "https://images.pexels.com/photos/2014422/pexels-photo-2014422.jpeg"}
            }]
        }"#;

        let parsed: PexelsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.photos[0].id, 2014422);
        assert_eq!(parsed.photos[0].photographer.as_deref(), Some("Joey Farina"));
    }
}
