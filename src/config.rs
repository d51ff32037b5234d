use crate::datasource::Theme;
use crate::platform::{ResizeMode, Transition, TransitionType};
use crate::utils::expand_tilde;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "WALLROTATE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// "auto" follows the desktop color scheme
    #[serde(default)]
    pub theme: ThemeMode,
    /// Where saved remote images are kept
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Staging area for downloads that have not been saved
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Log filter used when RUST_LOG is not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default)]
    pub setter: SetterConfig,
    /// Credentials per provider name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub themes: ThemesConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn fixed(&self) -> Option<Theme> {
        match self {
            ThemeMode::Auto => None,
            ThemeMode::Light => Some(Theme::Light),
            ThemeMode::Dark => Some(Theme::Dark),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key; a leading "Bearer " is ignored
    #[serde(default)]
    pub auth: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemesConfig {
    #[serde(default)]
    pub light: ThemeSources,
    #[serde(default)]
    pub dark: ThemeSources,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeSources {
    #[serde(default)]
    pub local: Vec<LocalDirConfig>,
    #[serde(default)]
    pub remote: Vec<RemoteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDirConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub provider: String,
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Overrides the global upload_dir for this source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SetterBackend {
    #[default]
    Swww,
    Gnome,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SetterConfig {
    #[serde(default)]
    pub backend: SetterBackend,
    /// Program and arguments for the "command" backend; the image path is appended
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default)]
    pub resize_mode: ResizeMode,
    #[serde(default)]
    pub transition: TransitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub transition_type: TransitionType,
    pub duration: f32,
    pub fps: u32,
}

fn default_weight() -> u32 {
    1
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "wallrotate", "wallrotate")
}

fn default_upload_dir() -> PathBuf {
    dirs::picture_dir()
        .map(|p| p.join("wallpapers"))
        .unwrap_or_else(|| PathBuf::from("~/Pictures/wallpapers"))
}

fn default_temp_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("tmp"))
        .unwrap_or_else(|| std::env::temp_dir().join("wallrotate"))
}

fn default_state_file() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_local_dir().join("state.json"))
        .unwrap_or_else(|| PathBuf::from("~/.local/state/wallrotate/state.json"))
}

impl Default for TransitionConfig {
    fn default() -> Self {
        let transition = Transition::default();
        Self {
            transition_type: transition.transition_type,
            duration: transition.duration,
            fps: transition.fps,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: ThemeMode::Auto,
            upload_dir: default_upload_dir(),
            temp_dir: default_temp_dir(),
            state_file: default_state_file(),
            log_level: None,
            setter: SetterConfig::default(),
            providers: BTreeMap::new(),
            themes: ThemesConfig::default(),
        }
    }
}

impl SetterConfig {
    pub fn transition(&self) -> Transition {
        Transition {
            transition_type: self.transition.transition_type,
            duration: self.transition.duration,
            fps: self.transition.fps,
        }
    }
}

impl Config {
    /// Return the path to the configuration file.
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        project_dirs()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load config from `path` (or the default location), writing a default
    /// file if none exists yet.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(expand_tilde)
            .unwrap_or_else(Self::config_path);

        if !path.exists() {
            let config = Config::default();
            config
                .save(&path)
                .with_context(|| format!("Failed to write default config to {}", path.display()))?;
            return Ok(config);
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(data)?;
        for theme in Theme::ALL {
            for remote in &mut config.theme_sources_mut(theme).remote {
                remote.weight = remote.weight.max(1);
            }
        }
        Ok(config)
    }

    /// Save config to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let data = toml::to_string_pretty(self)?;
        fs::write(path, data)?;

        Ok(())
    }

    pub fn theme_sources(&self, theme: Theme) -> &ThemeSources {
        match theme {
            Theme::Light => &self.themes.light,
            Theme::Dark => &self.themes.dark,
        }
    }

    fn theme_sources_mut(&mut self, theme: Theme) -> &mut ThemeSources {
        match theme {
            Theme::Light => &mut self.themes.light,
            Theme::Dark => &mut self.themes.dark,
        }
    }

    /// Credentials for `provider`, empty when not configured.
    pub fn auth_for(&self, provider: &str) -> &str {
        self.providers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider))
            .map(|(_, p)| p.auth.as_str())
            .unwrap_or("")
    }

    pub fn upload_dir(&self) -> PathBuf {
        expand_tilde(&self.upload_dir)
    }

    pub fn temp_dir(&self) -> PathBuf {
        expand_tilde(&self.temp_dir)
    }

    pub fn state_file(&self) -> PathBuf {
        expand_tilde(&self.state_file)
    }
}
