//! Selection engine
//!
//! One rotation: resolve the theme, drop the previous temp download, pick an
//! image from local or remote sources, hand it to the wallpaper setter and
//! record it in the state file. The engine is the only writer of the current
//! wallpaper and history; remote sources only touch their prefetch entries.

use crate::config::Config;
use crate::datasource::{
    Image, LocalSource, RemoteSource, RemoteSourceConfig, SourceManager, Theme,
};
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::provider::{create_provider, PROVIDER_NAMES};
use crate::state::{CurrentWallpaper, PrefetchStore, StateStore};
use crate::utils::{expand_tilde, remove_quietly};
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-call overrides for [`Engine::next`]
#[derive(Debug, Clone, Default)]
pub struct NextOptions {
    pub theme: Option<Theme>,
    /// Provider name, or "local" to stay on local directories
    pub provider: Option<String>,
    pub query: Option<String>,
}

/// The current wallpaper and whether its file is still on disk
#[derive(Debug, Clone)]
pub struct WallpaperInfo {
    pub current: CurrentWallpaper,
    pub exists: bool,
}

pub struct Engine {
    config: Config,
    manager: SourceManager,
    state: Arc<StateStore>,
    platform: Platform,
}

/// Build the source manager described by `config`.
///
/// Identifiers are `<theme>-local[-N]` and `<theme>-<provider>[-N]`, numbered
/// in config order so they stay stable across runs.
pub fn build_sources(config: &Config, store: Arc<dyn PrefetchStore>) -> SourceManager {
    let mut manager = SourceManager::new();

    for theme in Theme::ALL {
        let sources = config.theme_sources(theme);

        for (i, dir) in sources.local.iter().enumerate() {
            let id = numbered(format!("{}-local", theme), i + 1);
            manager.add_local(LocalSource::new(id, expand_tilde(&dir.path), dir.recursive, theme));
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for remote in &sources.remote {
            let base = format!("{}-{}", theme, remote.provider.trim().to_lowercase());
            let count = seen.entry(base.clone()).or_default();
            *count += 1;
            let id = numbered(base, *count);

            let provider = create_provider(&remote.provider, config.auth_for(&remote.provider));
            if provider.is_none() {
                tracing::warn!(source = %id, provider = %remote.provider, "unknown provider");
            }

            let upload_dir = remote
                .upload_dir
                .as_ref()
                .map(expand_tilde)
                .unwrap_or_else(|| config.upload_dir());

            manager.add_remote(RemoteSource::new(
                RemoteSourceConfig {
                    id,
                    theme,
                    queries: remote.queries.clone(),
                    upload_dir,
                    temp_dir: config.temp_dir(),
                    weight: remote.weight,
                },
                provider,
                Some(store.clone()),
            ));
        }
    }

    manager
}

fn numbered(base: String, n: usize) -> String {
    if n <= 1 {
        base
    } else {
        format!("{}-{}", base, n)
    }
}

/// Rename, or copy and unlink when the rename fails (e.g. across filesystems).
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| Error::io("failed to copy to", to, e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| Error::io("failed to remove", from, e))
}

impl Engine {
    /// Open the state file and build sources from `config`.
    ///
    /// An unreadable state file is replaced by a fresh one rather than
    /// blocking rotation.
    pub async fn open(config: Config, platform: Platform) -> Self {
        let state_file = config.state_file();
        let state = match StateStore::load(&state_file) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %state_file.display(), error = %e, "ignoring unreadable state file");
                StateStore::empty(&state_file)
            }
        };
        Self::new(config, Arc::new(state), platform).await
    }

    pub async fn new(config: Config, state: Arc<StateStore>, platform: Platform) -> Self {
        let manager = build_sources(&config, state.clone());
        Self::with_sources(config, manager, state, platform).await
    }

    pub async fn with_sources(
        config: Config,
        manager: SourceManager,
        state: Arc<StateStore>,
        platform: Platform,
    ) -> Self {
        let engine = Self {
            config,
            manager,
            state,
            platform,
        };
        engine.drop_orphan_prefetches().await;
        engine
    }

    /// Forget prefetched images of sources that no longer exist.
    async fn drop_orphan_prefetches(&self) {
        let ids = self.manager.remote_ids();
        let dropped = self.state.retain_prefetch(|id| ids.contains(id));
        if dropped.is_empty() {
            return;
        }

        let temp_dir = self.config.temp_dir();
        for entry in &dropped {
            if entry.path.starts_with(&temp_dir) {
                remove_quietly(&entry.path).await;
            }
        }
        tracing::debug!(count = dropped.len(), "dropped prefetches of removed sources");
        if let Err(e) = self.state.save() {
            tracing::warn!(path = %self.state.path().display(), error = %e, "failed to save state");
        }
    }

    /// Explicit override, then the configured theme, then the desktop's.
    pub async fn resolve_theme(&self, theme: Option<Theme>) -> Theme {
        if let Some(theme) = theme.or_else(|| self.config.theme.fixed()) {
            return theme;
        }
        self.platform.theme.detect().await
    }

    /// Rotate to a new wallpaper.
    pub async fn next(&self, cancel: &CancellationToken, options: &NextOptions) -> Result<Image> {
        let theme = self.resolve_theme(options.theme).await;

        if let Some(prev) = self.state.current().filter(|c| c.is_temp) {
            remove_quietly(&prev.path).await;
        }

        let image = self.pick(cancel, theme, options).await?;

        self.platform.wallpaper.set(&image.path).await?;
        self.state.set_current(
            &image.path,
            &image.source_id,
            theme,
            &image.query,
            !image.is_local,
        );
        if let Err(e) = self.state.save() {
            tracing::warn!(path = %self.state.path().display(), error = %e, "failed to save state");
        }

        tracing::info!(
            path = %image.path.display(),
            source = %image.source_id,
            theme = %image.theme,
            setter = self.platform.wallpaper.name(),
            "wallpaper set"
        );
        Ok(image)
    }

    async fn pick(
        &self,
        cancel: &CancellationToken,
        theme: Theme,
        options: &NextOptions,
    ) -> Result<Image> {
        let query = options.query.as_deref().map(str::trim).unwrap_or_default();
        let provider = options
            .provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        if let Some(name) = provider {
            if name.eq_ignore_ascii_case("local") {
                return self.pick_local(cancel, theme);
            }
            return self.fetch_from_provider(cancel, theme, name, query).await;
        }

        if !query.is_empty() {
            return self.manager.fetch_random_remote(cancel, theme, query).await;
        }

        let has_local = !self.manager.get_local(theme).is_empty();
        let has_remote = !self.manager.get_remote(theme).is_empty();
        let remote_first = match (has_local, has_remote) {
            (true, true) => rand::thread_rng().gen_bool(0.5),
            (false, true) => true,
            (true, false) => false,
            (false, false) if self.manager.is_empty() => {
                return Err(Error::NoSources("no sources configured".to_string()))
            }
            (false, false) => {
                return Err(Error::NoSources(format!(
                    "nothing configured for the {} theme",
                    theme
                )))
            }
        };

        let first = if remote_first {
            self.pick_remote(cancel, theme).await
        } else {
            self.pick_local(cancel, theme)
        };
        let first_err = match first {
            Ok(image) => return Ok(image),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => e,
        };

        tracing::debug!(error = %first_err, remote = remote_first, "falling back to the other source kind");
        let second = if remote_first {
            self.pick_local(cancel, theme)
        } else {
            self.pick_remote(cancel, theme).await
        };
        match second {
            Ok(image) => Ok(image),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(second_err) => Err(Error::NoSources(format!("{}; {}", first_err, second_err))),
        }
    }

    /// Local pick that avoids the history and the wallpaper on screen.
    fn pick_local(&self, cancel: &CancellationToken, theme: Theme) -> Result<Image> {
        let mut exclude = self.state.history();
        if let Some(current) = self.state.current() {
            exclude.push(current.path);
        }
        self.manager.pick_random_local(cancel, theme, &exclude)
    }

    async fn pick_remote(&self, cancel: &CancellationToken, theme: Theme) -> Result<Image> {
        self.manager.fetch_random_remote(cancel, theme, "").await
    }

    /// Fetch from one named provider, building a throwaway source when the
    /// theme has none configured for it.
    async fn fetch_from_provider(
        &self,
        cancel: &CancellationToken,
        theme: Theme,
        name: &str,
        query: &str,
    ) -> Result<Image> {
        let managed = self
            .manager
            .find_remote_by_provider(theme, name)
            .or_else(|| self.manager.find_remote(name).filter(|s| s.theme() == theme));
        if let Some(source) = managed {
            return source.fetch_random(cancel, query).await;
        }

        let provider = create_provider(name, self.config.auth_for(name))
            .ok_or_else(|| {
                Error::NotConfigured(format!(
                    "unknown provider '{}' (expected local, {})",
                    name,
                    PROVIDER_NAMES.join(", ")
                ))
            })?;
        let source = RemoteSource::new(
            RemoteSourceConfig {
                id: format!("{}-{}", theme, provider.name()),
                theme,
                queries: Vec::new(),
                upload_dir: self.config.upload_dir(),
                temp_dir: self.config.temp_dir(),
                weight: 1,
            },
            Some(provider),
            None,
        );
        source.fetch_random(cancel, query).await
    }

    /// Where images of `source_id` are kept once saved.
    fn upload_dir_for(&self, source_id: &str) -> PathBuf {
        self.manager
            .find_remote(source_id)
            .map(|s| s.upload_dir().to_path_buf())
            .unwrap_or_else(|| self.config.upload_dir())
    }

    fn current_or_err(&self) -> Result<CurrentWallpaper> {
        self.state
            .current()
            .ok_or_else(|| Error::NotFound("no wallpaper has been set yet".to_string()))
    }

    /// Move the current temp download into its source's upload dir.
    ///
    /// Returns the permanent path; already-saved wallpapers are left alone.
    pub async fn save_current(&self) -> Result<PathBuf> {
        let current = self.current_or_err()?;
        if !current.is_temp {
            return Ok(current.path);
        }

        let file_name = current
            .path
            .file_name()
            .ok_or_else(|| Error::NotFound(format!("file name of {}", current.path.display())))?;
        let upload_dir = self.upload_dir_for(&current.source_id);
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .map_err(|e| Error::io("failed to create", &upload_dir, e))?;

        let dest = upload_dir.join(file_name);
        move_file(&current.path, &dest).await?;
        self.state.mark_saved(&dest);
        self.state.save()?;

        // The desktop may still reference the old temp path
        if let Err(e) = self.platform.wallpaper.set(&dest).await {
            tracing::warn!(path = %dest.display(), error = %e, "failed to re-apply saved wallpaper");
        }

        tracing::info!(path = %dest.display(), "wallpaper saved");
        Ok(dest)
    }

    /// Delete the current downloaded wallpaper and rotate to another one.
    ///
    /// Files from local directories are never deleted.
    pub async fn delete_current(&self, cancel: &CancellationToken) -> Result<Image> {
        let current = self.current_or_err()?;

        let from_remote = current.is_temp
            || self.manager.find_remote(&current.source_id).is_some()
            || current.path.starts_with(self.config.upload_dir());
        if !from_remote {
            return Err(Error::NotConfigured(format!(
                "{} belongs to local source {}; only downloaded wallpapers can be deleted",
                current.path.display(),
                current.source_id
            )));
        }

        if let Err(e) = tokio::fs::remove_file(&current.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(Error::io("failed to delete", &current.path, e));
            }
        }
        self.state.clear();
        tracing::info!(path = %current.path.display(), "wallpaper deleted");

        let options = NextOptions {
            theme: Some(current.theme),
            ..Default::default()
        };
        self.next(cancel, &options).await
    }

    /// What the desktop itself reports, which can drift from the state file.
    pub async fn desktop_wallpaper(&self) -> Result<PathBuf> {
        self.platform.wallpaper.get().await
    }

    pub fn info(&self) -> Option<WallpaperInfo> {
        self.state.current().map(|current| WallpaperInfo {
            exists: current.path.is_file(),
            current,
        })
    }

    fn existing_current(&self) -> Result<PathBuf> {
        let current = self.current_or_err()?;
        if !current.path.exists() {
            return Err(Error::NotFound(current.path.display().to_string()));
        }
        Ok(current.path)
    }

    /// Show the current wallpaper in the file manager.
    pub async fn reveal_current(&self) -> Result<PathBuf> {
        let path = self.existing_current()?;
        self.platform.files.reveal(&path).await?;
        Ok(path)
    }

    /// Open the current wallpaper in the default viewer.
    pub async fn open_current(&self) -> Result<PathBuf> {
        let path = self.existing_current()?;
        self.platform.files.open(&path).await?;
        Ok(path)
    }

    pub fn describe_sources(&self) -> Vec<(Theme, String)> {
        self.manager.describe()
    }

    /// Join background prefetches so their results reach the state file.
    pub async fn wait_prefetch(&self) {
        self.manager.wait_prefetch().await;
    }

    /// Like [`Engine::wait_prefetch`], but gives up when `cancel` fires.
    /// Returns whether every prefetch finished. The prefetches keep running.
    pub async fn finish_prefetch(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = self.wait_prefetch() => true,
            _ = cancel.cancelled() => false,
        }
    }
}
