use super::http::{HttpClient, DEFAULT_TIMEOUT};
use super::{collect_queries, ImageMeta, Provider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const API_BASE: &str = "https://api.unsplash.com";

// Unsplash caps per_page/count at 30
const PAGE_SIZE: u32 = 30;

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    id: String,
    width: u32,
    height: u32,
    urls: UnsplashUrls,
    links: UnsplashLinks,
    user: UnsplashUser,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    full: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashLinks {
    html: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashUser {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashSearchResponse {
    results: Vec<UnsplashPhoto>,
}

impl From<UnsplashPhoto> for ImageMeta {
    fn from(photo: UnsplashPhoto) -> Self {
        ImageMeta {
            id: photo.id,
            url: photo.links.html,
            download_url: photo.urls.full,
            width: Some(photo.width),
            height: Some(photo.height),
            author: Some(photo.user.name),
            source: "unsplash".to_string(),
        }
    }
}

/// Unsplash search API (requires an access key)
pub struct Unsplash {
    http: HttpClient,
    access_key: String,
}

impl Unsplash {
    pub fn new(access_key: String) -> Self {
        Self {
            http: HttpClient::new("unsplash", DEFAULT_TIMEOUT),
            access_key,
        }
    }

    async fn search_one(
        &self,
        cancel: &CancellationToken,
        query: Option<&str>,
    ) -> Result<Vec<ImageMeta>> {
        let auth = format!("Client-ID {}", self.access_key);

        let photos = match query {
            Some(query) => {
                let request = self
                    .http
                    .get(&format!("{}/search/photos", API_BASE))
                    .header("Authorization", auth)
                    .query(&[
                        ("query", query.to_string()),
                        ("per_page", PAGE_SIZE.to_string()),
                        ("orientation", "landscape".to_string()),
                    ]);
                self.http
                    .get_json::<UnsplashSearchResponse>(cancel, request)
                    .await?
                    .results
            }
            None => {
                // No query: random landscape photos
                let request = self
                    .http
                    .get(&format!("{}/photos/random", API_BASE))
                    .header("Authorization", auth)
                    .query(&[
                        ("count", PAGE_SIZE.to_string()),
                        ("orientation", "landscape".to_string()),
                    ]);
                self.http
                    .get_json::<Vec<UnsplashPhoto>>(cancel, request)
                    .await?
            }
        };

        Ok(photos.into_iter().map(ImageMeta::from).collect())
    }
}

#[async_trait]
impl Provider for Unsplash {
    fn name(&self) -> &'static str {
        "unsplash"
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        queries: &[String],
    ) -> Result<Vec<ImageMeta>> {
        if self.access_key.is_empty() {
            return Err(Error::NotConfigured(
                "unsplash requires an access key".to_string(),
            ));
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
