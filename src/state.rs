//! Persisted rotation state
//!
//! One JSON document holds the current wallpaper, the recent history used
//! to avoid repeats, and per-source prefetched images. Older files stored a
//! single prefetch object (`{path, source_id, cache_key, fetched_at}`); those
//! are migrated to the keyed map on load and written back in the new shape on
//! the next save.
//!
//! The store is shared between the engine and background prefetch tasks, so
//! every accessor goes through one mutex.

use crate::datasource::Theme;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maximum number of paths kept in the rotation history.
pub const MAX_HISTORY: usize = 100;

/// The wallpaper most recently installed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWallpaper {
    pub path: PathBuf,
    pub source_id: String,
    pub theme: Theme,
    pub set_at: DateTime<Utc>,
    /// File still lives in the temp dir (not saved to the upload dir)
    pub is_temp: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,
}

/// An image fetched in the background, waiting for the next rotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchEntry {
    pub path: PathBuf,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentWallpaper>,
    #[serde(default)]
    pub history: VecDeque<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prefetched: BTreeMap<String, PrefetchEntry>,
}

impl StateData {
    fn push_history(&mut self, path: &Path) {
        if path.as_os_str().is_empty() || self.history.iter().any(|p| p == path) {
            return;
        }
        self.history.push_back(path.to_path_buf());
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Re-establish history invariants after loading arbitrary input.
    fn normalize(&mut self) {
        if self
            .current
            .as_ref()
            .is_some_and(|c| c.path.as_os_str().is_empty())
        {
            self.current = None;
        }

        let raw = std::mem::take(&mut self.history);
        for path in raw {
            self.push_history(&path);
        }
        if let Some(current) = &self.current {
            self.history.retain(|p| p != &current.path);
        }
    }
}

/// Permissive on-disk shape: loosely typed fields are decoded in a second pass.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    theme: Option<serde_json::Value>,
    #[serde(default)]
    current: Option<serde_json::Value>,
    #[serde(default)]
    history: VecDeque<PathBuf>,
    #[serde(default)]
    prefetched: Option<serde_json::Value>,
}

/// Single-entry prefetch format written by older versions
#[derive(Deserialize)]
struct LegacyPrefetch {
    path: PathBuf,
    source_id: String,
    fetched_at: DateTime<Utc>,
}

fn decode_prefetched(raw: Option<serde_json::Value>) -> BTreeMap<String, PrefetchEntry> {
    let Some(raw) = raw.filter(|v| !v.is_null()) else {
        return BTreeMap::new();
    };

    if let Ok(map) = serde_json::from_value::<BTreeMap<String, PrefetchEntry>>(raw.clone()) {
        return map;
    }

    match serde_json::from_value::<LegacyPrefetch>(raw) {
        Ok(legacy) if !legacy.source_id.is_empty() => {
            tracing::debug!(source = %legacy.source_id, "migrating legacy prefetch entry");
            BTreeMap::from([(
                legacy.source_id,
                PrefetchEntry {
                    path: legacy.path,
                    fetched_at: legacy.fetched_at,
                    query: String::new(),
                },
            )])
        }
        _ => {
            tracing::debug!("discarding unreadable prefetch data");
            BTreeMap::new()
        }
    }
}

/// Rotation state bound to its JSON file
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    data: Mutex<StateData>,
}

impl StateStore {
    /// Load state from `path`; a missing or empty file yields a fresh state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = crate::utils::expand_tilde(path);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::io("failed to read state file", &path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::empty(path));
        }

        let envelope: Envelope = serde_json::from_str(&content)?;
        let mut data = StateData {
            theme: envelope.theme.and_then(|v| serde_json::from_value(v).ok()),
            // A zero-valued record (empty theme, empty path) means "nothing set"
            current: envelope
                .current
                .and_then(|v| serde_json::from_value(v).ok()),
            history: envelope.history,
            prefetched: decode_prefetched(envelope.prefetched),
        };
        data.normalize();

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: Mutex::new(StateData::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data(&self) -> MutexGuard<'_, StateData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the state as indented JSON (dirs 0755, file 0644).
    pub fn save(&self) -> Result<()> {
        let data = self.data();
        let content = serde_json::to_string_pretty(&*data)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| Error::io("failed to create", parent, e))?;
        }

        // Write next to the target and rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        write_file(&tmp, content.as_bytes()).map_err(|e| Error::io("failed to write", &tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::io("failed to replace", &self.path, e))?;

        Ok(())
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> StateData {
        self.data().clone()
    }

    #[cfg(test)]
    pub fn theme(&self) -> Option<Theme> {
        self.data().theme
    }

    pub fn current(&self) -> Option<CurrentWallpaper> {
        self.data().current.clone()
    }

    pub fn history(&self) -> Vec<PathBuf> {
        self.data().history.iter().cloned().collect()
    }

    /// Record a newly installed wallpaper.
    ///
    /// The previous wallpaper joins the history only if it was a permanent
    /// file; temp downloads are deleted on supersession and never remembered.
    pub fn set_current(
        &self,
        path: &Path,
        source_id: &str,
        theme: Theme,
        query: &str,
        is_temp: bool,
    ) {
        let mut data = self.data();

        if let Some(prev) = data.current.take() {
            if !prev.is_temp && prev.path != path {
                data.push_history(&prev.path);
            }
        }
        data.history.retain(|p| p != path);

        data.current = Some(CurrentWallpaper {
            path: path.to_path_buf(),
            source_id: source_id.to_string(),
            theme,
            set_at: Utc::now(),
            is_temp,
            query: query.to_string(),
        });
        data.theme = Some(theme);
    }

    /// The current temp image was promoted to `new_path`.
    pub fn mark_saved(&self, new_path: &Path) {
        if let Some(current) = self.data().current.as_mut() {
            current.path = new_path.to_path_buf();
            current.is_temp = false;
        }
    }

    pub fn clear(&self) {
        self.data().current = None;
    }

    /// Prefetched image for `source_id`, if its file still exists.
    ///
    /// Entries whose file disappeared are dropped.
    pub fn get_prefetch(&self, source_id: &str) -> Option<PrefetchEntry> {
        let mut data = self.data();
        let entry = data.prefetched.get(source_id)?;
        if entry.path.is_file() {
            return Some(entry.clone());
        }
        tracing::debug!(source = source_id, path = %entry.path.display(), "prefetched file is gone");
        data.prefetched.remove(source_id);
        None
    }

    pub fn set_prefetch(&self, source_id: &str, path: &Path, query: &str) {
        self.data().prefetched.insert(
            source_id.to_string(),
            PrefetchEntry {
                path: path.to_path_buf(),
                fetched_at: Utc::now(),
                query: query.to_string(),
            },
        );
    }

    pub fn clear_prefetch(&self, source_id: &str) {
        self.data().prefetched.remove(source_id);
    }

    /// Drop prefetch entries whose source is not configured any more.
    /// Returns the removed entries so their files can be cleaned up.
    pub fn retain_prefetch(&self, keep: impl Fn(&str) -> bool) -> Vec<PrefetchEntry> {
        let mut data = self.data();
        let stale: Vec<String> = data
            .prefetched
            .keys()
            .filter(|id| !keep(id.as_str()))
            .cloned()
            .collect();
        stale
            .iter()
            .filter_map(|id| data.prefetched.remove(id))
            .collect()
    }
}

/// Access to the prefetched submap, as needed by remote sources.
pub trait PrefetchStore: Send + Sync {
    fn get_prefetch(&self, source_id: &str) -> Option<PrefetchEntry>;
    fn set_prefetch(&self, source_id: &str, path: &Path, query: &str);
    fn clear_prefetch(&self, source_id: &str);
    fn save(&self) -> Result<()>;
}

impl PrefetchStore for StateStore {
    fn get_prefetch(&self, source_id: &str) -> Option<PrefetchEntry> {
        StateStore::get_prefetch(self, source_id)
    }

    fn set_prefetch(&self, source_id: &str, path: &Path, query: &str) {
        StateStore::set_prefetch(self, source_id, path, query)
    }

    fn clear_prefetch(&self, source_id: &str) {
        StateStore::clear_prefetch(self, source_id)
    }

    fn save(&self) -> Result<()> {
        StateStore::save(self)
    }
}

#[cfg(unix)]
fn create_dir_all(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
}

#[cfg(not(unix))]
fn create_dir_all(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

fn write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> StateStore {
        StateStore::empty(dir.join("state.json"))
    }

    #[test]
    fn test_load_missing_and_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");

        let state = StateStore::load(&path).unwrap();
        assert_eq!(state.path(), path);
        assert_eq!(state.snapshot(), StateData::default());

        fs::write(&path, "  \n").unwrap();
        let state = StateStore::load(&path).unwrap();
        assert_eq!(state.snapshot(), StateData::default());
    }

    #[test]
    fn test_history_bounded_and_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let state = store_in(tmp.path());

        for i in 0..250 {
            let p = PathBuf::from(format!("/walls/{}.jpg", i % 130));
            state.set_current(&p, "dark-local", Theme::Dark, "", false);

            let history = state.history();
            assert!(history.len() <= MAX_HISTORY);
            let mut dedup = history.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), history.len(), "history has duplicates");
            assert!(!history.contains(&p), "current path must not be in history");
        }
    }

    #[test]
    fn test_history_evicts_oldest() {
        let tmp = tempfile::tempdir().unwrap();
        let state = store_in(tmp.path());
        for i in 0..=MAX_HISTORY + 2 {
            let path = PathBuf::from(format!("/w/{}.png", i));
            state.set_current(&path, "dark-local", Theme::Dark, "", false);
        }
        let history = state.history();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0], PathBuf::from("/w/2.png"));
    }

    #[test]
    fn test_temp_wallpaper_not_added_to_history() {
        let tmp = tempfile::tempdir().unwrap();
        let state = store_in(tmp.path());

        state.set_current(Path::new("/tmp/x/wallhaven_1.jpg"), "dark-wallhaven", Theme::Dark, "sky", true);
        state.set_current(Path::new("/walls/a.jpg"), "dark-local", Theme::Dark, "", false);
        assert!(state.history().is_empty());

        state.set_current(Path::new("/walls/b.jpg"), "dark-local", Theme::Dark, "", false);
        assert_eq!(state.history(), vec![PathBuf::from("/walls/a.jpg")]);
        assert_eq!(state.theme(), Some(Theme::Dark));
    }

    #[test]
    fn test_mark_saved_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let state = store_in(tmp.path());

        state.set_current(Path::new("/tmp/t.jpg"), "light-bing", Theme::Light, "", true);
        state.mark_saved(Path::new("/up/t.jpg"));
        let current = state.current().unwrap();
        assert_eq!(current.path, PathBuf::from("/up/t.jpg"));
        assert!(!current.is_temp);

        state.clear();
        assert!(state.current().is_none());
    }

    #[test]
    fn test_prefetch_self_heals_when_file_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let state = store_in(tmp.path());
        let file = tmp.path().join("pexels_1.jpg");
        fs::write(&file, b"img").unwrap();

        state.set_prefetch("dark-pexels", &file, "forest");
        let entry = state.get_prefetch("dark-pexels").unwrap();
        assert_eq!(entry.path, file);
        assert_eq!(entry.query, "forest");

        fs::remove_file(&file).unwrap();
        assert!(state.get_prefetch("dark-pexels").is_none());
        assert!(state.snapshot().prefetched.is_empty());
    }

    #[test]
    fn test_legacy_prefetch_is_migrated() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("a.jpg");
        fs::write(&image, b"img").unwrap();

        let path = tmp.path().join("state.json");
        let legacy = serde_json::json!({
            "theme": "dark",
            "history": [],
            "prefetched": {
                "path": image,
                "source_id": "dark-bing",
                "cache_key": "dark:bing:",
                "fetched_at": "2024-01-01T00:00:00Z"
            }
        });
        fs::write(&path, legacy.to_string()).unwrap();

        let state = StateStore::load(&path).unwrap();
        let entry = state.get_prefetch("dark-bing").unwrap();
        assert_eq!(entry.path, image);
        assert_eq!(entry.query, "");

        state.save().unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written["prefetched"]["dark-bing"].is_object());
        assert!(written["prefetched"].get("cache_key").is_none());
    }

    #[test]
    fn test_unreadable_prefetch_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        fs::write(
            &path,
            r#"{"history": ["/a.jpg", "/a.jpg", "/b.jpg"], "prefetched": [1, 2, 3]}"#,
        )
        .unwrap();

        let state = StateStore::load(&path).unwrap();
        let data = state.snapshot();
        assert!(data.prefetched.is_empty());
        assert_eq!(data.history, VecDeque::from([PathBuf::from("/a.jpg"), PathBuf::from("/b.jpg")]));
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("dir").join("state.json");
        let state = StateStore::empty(&path);

        state.set_current(Path::new("/walls/a.jpg"), "light-local", Theme::Light, "", false);
        state.set_current(Path::new("/tmp/u.jpg"), "light-unsplash", Theme::Light, "sea", true);
        state.set_prefetch("light-unsplash", Path::new("/tmp/v.jpg"), "sea");
        state.save().unwrap();

        let loaded = StateStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), state.snapshot());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn test_retain_prefetch_drops_unknown_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let state = store_in(tmp.path());
        state.set_prefetch("dark-bing", Path::new("/tmp/a.jpg"), "");
        state.set_prefetch("dark-gone", Path::new("/tmp/b.jpg"), "");

        let removed = state.retain_prefetch(|id| id == "dark-bing");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].path, PathBuf::from("/tmp/b.jpg"));
        assert_eq!(
            state.snapshot().prefetched.keys().collect::<Vec<_>>(),
            vec!["dark-bing"]
        );
    }
}
