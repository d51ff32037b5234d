use super::{Image, LocalSource, RemoteSource, Theme};
use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shuffle `items` so that item `i` comes first with probability
/// `w_i / sum(w)`; later positions are drawn the same way from what remains.
///
/// Weights of zero are treated as one.
pub fn weighted_shuffle<T, R>(mut items: Vec<T>, weight: impl Fn(&T) -> u32, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let mut shuffled = Vec::with_capacity(items.len());

    while !items.is_empty() {
        let cumulative: Vec<u64> = items
            .iter()
            .scan(0u64, |acc, item| {
                *acc += u64::from(weight(item).max(1));
                Some(*acc)
            })
            .collect();
        let total = cumulative[cumulative.len() - 1];
        let draw = rng.gen_range(0..total);
        let idx = cumulative.partition_point(|&c| c <= draw);
        shuffled.push(items.remove(idx));
    }

    shuffled
}

/// Local and remote sources grouped by theme
#[derive(Default)]
pub struct SourceManager {
    local: HashMap<Theme, Vec<LocalSource>>,
    remote: HashMap<Theme, Vec<Arc<RemoteSource>>>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_local(&mut self, source: LocalSource) {
        self.local.entry(source.theme()).or_default().push(source);
    }

    pub fn add_remote(&mut self, source: RemoteSource) {
        self.remote
            .entry(source.theme())
            .or_default()
            .push(Arc::new(source));
    }

    pub fn get_local(&self, theme: Theme) -> &[LocalSource] {
        self.local.get(&theme).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get_remote(&self, theme: Theme) -> &[Arc<RemoteSource>] {
        self.remote.get(&theme).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn find_remote(&self, id: &str) -> Option<&Arc<RemoteSource>> {
        self.remote.values().flatten().find(|s| s.id() == id)
    }

    /// First remote source of `theme` backed by the named provider.
    pub fn find_remote_by_provider(&self, theme: Theme, provider: &str) -> Option<&Arc<RemoteSource>> {
        self.get_remote(theme)
            .iter()
            .find(|s| s.provider_name().is_some_and(|p| p.eq_ignore_ascii_case(provider)))
    }

    pub fn remote_ids(&self) -> HashSet<&str> {
        self.remote.values().flatten().map(|s| s.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.local.values().all(Vec::is_empty) && self.remote.values().all(Vec::is_empty)
    }

    /// Pick a random image from the theme's local directories.
    ///
    /// Images listed in `exclude` are avoided, but a source whose images are
    /// all excluded still offers its full list: history only biases the pick.
    pub fn pick_random_local(
        &self,
        cancel: &CancellationToken,
        theme: Theme,
        exclude: &[PathBuf],
    ) -> Result<Image> {
        let sources = self.get_local(theme);
        if sources.is_empty() {
            return Err(Error::Empty(format!("no local sources for the {} theme", theme)));
        }

        let excluded: HashSet<&Path> = exclude.iter().map(PathBuf::as_path).collect();
        let mut available: Vec<Vec<Image>> = Vec::new();
        let mut last_error = None;

        for source in sources {
            match source.list_images(cancel) {
                Ok(images) if images.is_empty() => {
                    tracing::debug!(source = source.id(), "local source has no images");
                }
                Ok(images) => {
                    let filtered: Vec<Image> = images
                        .iter()
                        .filter(|img| !excluded.contains(img.path.as_path()))
                        .cloned()
                        .collect();
                    available.push(if filtered.is_empty() { images } else { filtered });
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(source = source.id(), error = %e, "local source failed");
                    last_error = Some(e);
                }
            }
        }

        let mut rng = rand::thread_rng();
        available
            .choose(&mut rng)
            .and_then(|images| images.choose(&mut rng))
            .cloned()
            .ok_or_else(|| {
                last_error.unwrap_or_else(|| {
                    Error::Empty(format!("no local images for the {} theme", theme))
                })
            })
    }

    /// Fetch from the theme's remote sources in weighted random order,
    /// returning the first success.
    pub async fn fetch_random_remote(
        &self,
        cancel: &CancellationToken,
        theme: Theme,
        query_override: &str,
    ) -> Result<Image> {
        let sources = self.get_remote(theme);
        if sources.is_empty() {
            return Err(Error::Empty(format!("no remote sources for the {} theme", theme)));
        }

        let order = {
            let mut rng = rand::thread_rng();
            weighted_shuffle(sources.iter().collect(), |s| s.weight(), &mut rng)
        };

        let mut last_error = None;
        for source in order {
            match source.fetch_random(cancel, query_override).await {
                Ok(image) => return Ok(image),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(source = source.id(), error = %e, "remote source failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Empty(format!("no remote images for the {} theme", theme))
        }))
    }

    /// Join outstanding background prefetches of every remote source.
    pub async fn wait_prefetch(&self) {
        for source in self.remote.values().flatten() {
            source.wait_prefetch().await;
        }
    }

    /// One line per configured source, grouped by theme.
    pub fn describe(&self) -> Vec<(Theme, String)> {
        let mut lines = Vec::new();
        for theme in Theme::ALL {
            for source in self.get_local(theme) {
                lines.push((theme, format!("local  {}", source.description())));
            }
            for source in self.get_remote(theme) {
                lines.push((theme, format!("remote {}", source.description())));
            }
        }
        lines
    }
}
