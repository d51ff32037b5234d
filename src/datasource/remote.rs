use super::{Image, Theme};
use crate::error::{Error, Result};
use crate::provider::{image_filename, Provider};
use crate::state::PrefetchStore;
use crate::utils::remove_quietly;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Static settings for one remote source
#[derive(Debug, Clone)]
pub struct RemoteSourceConfig {
    pub id: String,
    pub theme: Theme,
    pub queries: Vec<String>,
    /// Permanent storage for images the user keeps
    pub upload_dir: PathBuf,
    /// Staging area for fresh downloads
    pub temp_dir: PathBuf,
    pub weight: u32,
}

/// State shared with background prefetch tasks
struct Fetcher {
    id: String,
    theme: Theme,
    provider: Option<Arc<dyn Provider>>,
    queries: Vec<String>,
    temp_dir: PathBuf,
    rng: Mutex<StdRng>,
    store: Option<Arc<dyn PrefetchStore>>,
}

impl Fetcher {
    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a prefetched image still matches what the caller asks for.
    fn prefetch_matches(&self, entry_query: &str, query_override: &str) -> bool {
        if !query_override.is_empty() {
            return entry_query == query_override;
        }
        // Older versions stored the whole query list joined with ", "
        self.queries.iter().any(|q| q == entry_query) || self.queries.join(", ") == entry_query
    }

    /// Search once and download a random hit into the temp dir.
    async fn do_fetch(
        &self,
        provider: &dyn Provider,
        cancel: &CancellationToken,
        query_override: &str,
    ) -> Result<Image> {
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| Error::io("failed to create", &self.temp_dir, e))?;

        let query = if !query_override.is_empty() {
            query_override.to_string()
        } else {
            let mut rng = self.rng();
            self.queries.choose(&mut *rng).cloned().unwrap_or_default()
        };
        let queries = if query.is_empty() {
            Vec::new()
        } else {
            vec![query.clone()]
        };

        let results = provider.search(cancel, &queries).await?;
        let meta = {
            let mut rng = self.rng();
            results.choose(&mut *rng).cloned()
        }
        .ok_or_else(|| {
            Error::provider(
                provider.name(),
                format!("no results for query '{}'", query),
            )
        })?;

        let dest = self.temp_dir.join(image_filename(provider.name(), &meta));
        remove_quietly(&dest).await;

        let path = provider.download(cancel, &meta, &dest).await?;
        tracing::debug!(
            source = %self.id,
            provider = %meta.source,
            query = %query,
            page = %meta.url,
            author = meta.author.as_deref().unwrap_or("unknown"),
            width = meta.width,
            height = meta.height,
            path = %path.display(),
            "downloaded image"
        );

        Ok(Image {
            path,
            source_id: self.id.clone(),
            theme: self.theme,
            is_local: false,
            query,
            url: Some(meta.download_url),
        })
    }

    /// Background fetch whose result is parked in the prefetch store.
    async fn prefetch(self: Arc<Self>, provider: Arc<dyn Provider>, query_override: String) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        // Independent token: the foreground caller finishing must not abort this
        let cancel = CancellationToken::new();
        match self.do_fetch(provider.as_ref(), &cancel, &query_override).await {
            Ok(image) => {
                store.set_prefetch(&self.id, &image.path, &image.query);
                if let Err(e) = store.save() {
                    tracing::debug!(source = %self.id, error = %e, "failed to persist prefetch");
                }
                tracing::debug!(source = %self.id, path = %image.path.display(), "prefetched next image");
            }
            Err(e) => {
                tracing::debug!(source = %self.id, error = %e, "prefetch failed");
            }
        }
    }
}

/// A remote gallery bound to local storage and a query list
pub struct RemoteSource {
    fetcher: Arc<Fetcher>,
    upload_dir: PathBuf,
    weight: u32,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl RemoteSource {
    pub fn new(
        config: RemoteSourceConfig,
        provider: Option<Arc<dyn Provider>>,
        store: Option<Arc<dyn PrefetchStore>>,
    ) -> Self {
        Self {
            fetcher: Arc::new(Fetcher {
                id: config.id,
                theme: config.theme,
                provider,
                queries: config.queries,
                temp_dir: config.temp_dir,
                rng: Mutex::new(StdRng::from_entropy()),
                store,
            }),
            upload_dir: config.upload_dir,
            weight: config.weight.max(1),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.fetcher.id
    }

    pub fn theme(&self) -> Theme {
        self.fetcher.theme
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.fetcher.provider.as_ref().map(|p| p.name())
    }

    pub fn description(&self) -> String {
        let queries = if self.fetcher.queries.is_empty() {
            "any".to_string()
        } else {
            self.fetcher.queries.join(", ")
        };
        format!(
            "{} ({}, weight {}, queries: {})",
            self.fetcher.id,
            self.provider_name().unwrap_or("unconfigured"),
            self.weight,
            queries
        )
    }

    /// Return a random image from this source.
    ///
    /// A matching prefetched image is returned without touching the network;
    /// otherwise one search + download happens in the foreground. Either way
    /// a background task then primes the next call.
    pub async fn fetch_random(
        &self,
        cancel: &CancellationToken,
        query_override: &str,
    ) -> Result<Image> {
        let Some(provider) = self.fetcher.provider.clone() else {
            return Err(Error::NotConfigured(format!(
                "source {} has no provider",
                self.fetcher.id
            )));
        };

        if let Some(store) = &self.fetcher.store {
            if let Some(entry) = store.get_prefetch(&self.fetcher.id) {
                let valid = self.fetcher.prefetch_matches(&entry.query, query_override);

                store.clear_prefetch(&self.fetcher.id);
                if let Err(e) = store.save() {
                    tracing::debug!(source = %self.fetcher.id, error = %e, "failed to persist prefetch removal");
                }

                if valid {
                    tracing::debug!(source = %self.fetcher.id, path = %entry.path.display(), "using prefetched image");
                    self.spawn_prefetch(provider, query_override);
                    return Ok(Image {
                        path: entry.path,
                        source_id: self.fetcher.id.clone(),
                        theme: self.fetcher.theme,
                        is_local: false,
                        query: entry.query,
                        url: None,
                    });
                }

                tracing::debug!(source = %self.fetcher.id, query = %entry.query, "discarding stale prefetch");
                if entry.path.starts_with(&self.fetcher.temp_dir) {
                    remove_quietly(&entry.path).await;
                }
            }
        }

        let image = self
            .fetcher
            .do_fetch(provider.as_ref(), cancel, query_override)
            .await?;

        if self.fetcher.store.is_some() {
            self.spawn_prefetch(provider, query_override);
        }

        Ok(image)
    }

    /// Block until every background prefetch started so far has finished.
    pub async fn wait_prefetch(&self) {
        loop {
            let handles = std::mem::take(&mut *self.pending());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::debug!(source = %self.fetcher.id, error = %e, "prefetch task aborted");
                }
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_prefetch(&self, provider: Arc<dyn Provider>, query_override: &str) {
        let fetcher = Arc::clone(&self.fetcher);
        let handle = tokio::spawn(fetcher.prefetch(provider, query_override.to_string()));

        let mut pending = self.pending();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::FakeProvider;
    use crate::state::StateStore;
    use std::fs;

    struct Fixture {
        _tmp: tempfile::TempDir,
        temp_dir: PathBuf,
        store: Arc<StateStore>,
        provider: Arc<FakeProvider>,
    }

    impl Fixture {
        fn new(provider: FakeProvider) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let temp_dir = tmp.path().join("tmp");
            let store = Arc::new(StateStore::empty(tmp.path().join("state.json")));
            Self {
                temp_dir,
                store,
                provider: Arc::new(provider),
                _tmp: tmp,
            }
        }

        fn source(&self, queries: &[&str], with_store: bool) -> RemoteSource {
            let store: Option<Arc<dyn PrefetchStore>> = if with_store {
                Some(self.store.clone())
            } else {
                None
            };
            RemoteSource::new(
                RemoteSourceConfig {
                    id: "dark-fake".to_string(),
                    theme: Theme::Dark,
                    queries: queries.iter().map(|q| q.to_string()).collect(),
                    upload_dir: self.temp_dir.with_file_name("upload"),
                    temp_dir: self.temp_dir.clone(),
                    weight: 1,
                },
                Some(self.provider.clone()),
                store,
            )
        }

        /// Park an existing file as prefetched for the test source.
        fn prefetched(&self, query: &str) -> PathBuf {
            fs::create_dir_all(&self.temp_dir).unwrap();
            let path = self.temp_dir.join("fake_prefetched.jpg");
            fs::write(&path, b"prefetched").unwrap();
            self.store.set_prefetch("dark-fake", &path, query);
            path
        }
    }

    #[tokio::test]
    async fn test_fetch_without_provider_is_not_configured() {
        let source = RemoteSource::new(
            RemoteSourceConfig {
                id: "light-x".to_string(),
                theme: Theme::Light,
                queries: vec![],
                upload_dir: PathBuf::from("/tmp/up"),
                temp_dir: PathBuf::from("/tmp/t"),
                weight: 0,
            },
            None,
            None,
        );
        assert_eq!(source.weight(), 1);
        let err = source.fetch_random(&CancellationToken::new(), "").await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_prefetch_consumed_without_search() {
        let fx = Fixture::new(FakeProvider::new("fake", 5));
        let prefetched = fx.prefetched("nature, landscape");
        let source = fx.source(&["nature", "landscape"], true);

        let image = source.fetch_random(&CancellationToken::new(), "").await.unwrap();
        assert_eq!(image.path, prefetched);
        assert_eq!(image.query, "nature, landscape");
        assert!(!image.is_local);
        assert!(fx.provider.search_calls().is_empty());

        source.wait_prefetch().await;
        let calls = fx.provider.search_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0] == vec!["nature"] || calls[0] == vec!["landscape"]);

        let next = fx.store.get_prefetch("dark-fake").unwrap();
        assert_ne!(next.path, prefetched);
        assert!(next.path.starts_with(&fx.temp_dir));
        assert!(["nature", "landscape"].contains(&next.query.as_str()));
    }

    #[tokio::test]
    async fn test_prefetch_with_single_matching_query_consumed() {
        let fx = Fixture::new(FakeProvider::new("fake", 2));
        let prefetched = fx.prefetched("landscape");
        let source = fx.source(&["nature", "landscape"], true);

        let image = source.fetch_random(&CancellationToken::new(), "").await.unwrap();
        assert_eq!(image.path, prefetched);
        source.wait_prefetch().await;
    }

    #[tokio::test]
    async fn test_prefetch_matching_override_consumed_without_search() {
        let fx = Fixture::new(FakeProvider::new("fake", 3));
        let prefetched = fx.prefetched("mountains");
        let source = fx.source(&["nature"], true);

        let image = source
            .fetch_random(&CancellationToken::new(), "mountains")
            .await
            .unwrap();
        assert_eq!(image.path, prefetched);
        assert_eq!(image.query, "mountains");
        assert!(fx.provider.search_calls().is_empty());

        source.wait_prefetch().await;
        assert_eq!(fx.provider.search_calls(), vec![vec!["mountains".to_string()]]);
        assert_eq!(fx.store.get_prefetch("dark-fake").unwrap().query, "mountains");
    }

    #[tokio::test]
    async fn test_background_prefetch_survives_caller_cancel() {
        let fx = Fixture::new(FakeProvider::new("fake", 2));
        let source = fx.source(&["nature"], true);

        let cancel = CancellationToken::new();
        let image = source.fetch_random(&cancel, "").await.unwrap();
        cancel.cancel();

        source.wait_prefetch().await;
        let parked = fx.store.get_prefetch("dark-fake").expect("prefetch should be parked");
        assert!(image.path.starts_with(&fx.temp_dir));
        assert!(parked.path.starts_with(&fx.temp_dir));
        assert!(parked.path.exists());
        assert_eq!(fx.provider.search_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_prefetch_rejected_by_override() {
        let fx = Fixture::new(FakeProvider::new("fake", 5));
        let prefetched = fx.prefetched("nature, landscape");
        let source = fx.source(&["nature", "landscape"], true);

        let image = source
            .fetch_random(&CancellationToken::new(), "mountains")
            .await
            .unwrap();
        assert_ne!(image.path, prefetched);
        assert_eq!(image.query, "mountains");
        assert!(image.url.is_some());
        assert_eq!(fx.provider.search_calls()[0], vec!["mountains"]);
        assert!(!prefetched.exists(), "stale prefetch file should be removed");

        source.wait_prefetch().await;
        let next = fx.store.get_prefetch("dark-fake").unwrap();
        assert_eq!(next.query, "mountains");
    }

    #[tokio::test]
    async fn test_prefetch_rejected_when_query_no_longer_configured() {
        let fx = Fixture::new(FakeProvider::new("fake", 3));
        let prefetched = fx.prefetched("cities");
        let source = fx.source(&["nature"], true);

        let image = source.fetch_random(&CancellationToken::new(), "").await.unwrap();
        assert_ne!(image.path, prefetched);
        assert_eq!(fx.provider.search_calls()[0], vec!["nature"]);
        source.wait_prefetch().await;
    }

    #[tokio::test]
    async fn test_missing_prefetch_file_falls_through_to_fetch() {
        let fx = Fixture::new(FakeProvider::new("fake", 3));
        let prefetched = fx.prefetched("nature");
        fs::remove_file(&prefetched).unwrap();
        let source = fx.source(&["nature"], true);

        let image = source.fetch_random(&CancellationToken::new(), "").await.unwrap();
        assert!(image.path.exists());
        assert_eq!(fx.provider.search_calls().len(), 1);
        source.wait_prefetch().await;
    }

    #[tokio::test]
    async fn test_fetch_downloads_into_temp_dir() {
        let fx = Fixture::new(FakeProvider::new("fake", 1));
        let source = fx.source(&[], false);

        let image = source.fetch_random(&CancellationToken::new(), "").await.unwrap();
        assert_eq!(image.path, fx.temp_dir.join("fake_fake-0.jpg"));
        assert!(image.path.exists());
        assert_eq!(image.source_id, "dark-fake");
        assert_eq!(image.query, "");

        // Empty query list is passed through; no store means no prefetch
        source.wait_prefetch().await;
        assert_eq!(fx.provider.search_calls(), vec![Vec::<String>::new()]);
        assert_eq!(fx.provider.download_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_with_no_results_fails() {
        let fx = Fixture::new(FakeProvider::new("fake", 0));
        let source = fx.source(&["nature"], true);

        let err = source.fetch_random(&CancellationToken::new(), "").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        source.wait_prefetch().await;
        assert!(fx.store.get_prefetch("dark-fake").is_none());
    }

    #[tokio::test]
    async fn test_failing_provider_surfaces_error() {
        let fx = Fixture::new(FakeProvider::failing("fake"));
        let source = fx.source(&["nature"], true);

        let err = source.fetch_random(&CancellationToken::new(), "").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert_eq!(fx.provider.search_calls().len(), 1);
    }
}
