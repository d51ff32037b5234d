use super::{run, WallpaperSetter};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Transition {
    pub transition_type: TransitionType,
    pub duration: f32,
    pub fps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    #[default]
    Fade,
    Wipe,
    Grow,
    Center,
    Outer,
    None,
}

/// How to resize/fit the wallpaper to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Resize to fill the screen, cropping parts that don't fit (default)
    #[default]
    Crop,
    /// Resize to fit inside the screen, preserving aspect ratio (adds padding)
    Fit,
    /// Don't resize, center the image (adds padding if smaller)
    No,
    /// Stretch to fill (distorts aspect ratio)
    Stretch,
}

impl ResizeMode {
    fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::Crop => "crop",
            ResizeMode::Fit => "fit",
            ResizeMode::No => "no",
            ResizeMode::Stretch => "stretch",
        }
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            transition_type: TransitionType::Fade,
            duration: 1.0,
            fps: 60,
        }
    }
}

impl TransitionType {
    fn as_str(&self) -> &'static str {
        match self {
            TransitionType::Fade => "fade",
            TransitionType::Wipe => "wipe",
            TransitionType::Grow => "grow",
            TransitionType::Center => "center",
            TransitionType::Outer => "outer",
            TransitionType::None => "none",
        }
    }
}

/// Wayland wallpaper daemon `swww`, applied to every output
pub struct SwwwSetter {
    transition: Transition,
    resize_mode: ResizeMode,
}

impl SwwwSetter {
    pub fn new(transition: Transition, resize_mode: ResizeMode) -> Self {
        Self {
            transition,
            resize_mode,
        }
    }

    /// Start swww-daemon if it is not running yet
    async fn ensure_daemon(&self) -> Result<()> {
        if run("swww", ["query"]).await.is_ok() {
            return Ok(());
        }

        tokio::process::Command::new("swww-daemon")
            .spawn()
            .map_err(|e| Error::Io {
                context: "failed to start swww-daemon".to_string(),
                source: e,
            })?;

        // Give it a moment to initialize
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    fn img_args<'a>(&'a self, path: &'a Path, duration: &'a str, fps: &'a str) -> Vec<&'a OsStr> {
        vec![
            OsStr::new("img"),
            path.as_os_str(),
            OsStr::new("--resize"),
            OsStr::new(self.resize_mode.as_str()),
            OsStr::new("--transition-type"),
            OsStr::new(self.transition.transition_type.as_str()),
            OsStr::new("--transition-duration"),
            OsStr::new(duration),
            OsStr::new("--transition-fps"),
            OsStr::new(fps),
        ]
    }
}

/// Extract the image path from `swww query` output, e.g.
/// `DP-1: 2560x1440, scale: 1, currently displaying: image: /path/to/img.jpg`
fn parse_query_output(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find_map(|line| line.split_once("image: "))
        .map(|(_, path)| PathBuf::from(path.trim()))
        .filter(|p| !p.as_os_str().is_empty())
}

#[async_trait]
impl WallpaperSetter for SwwwSetter {
    fn name(&self) -> &'static str {
        "swww"
    }

    async fn set(&self, path: &Path) -> Result<()> {
        self.ensure_daemon().await?;

        let duration = self.transition.duration.to_string();
        let fps = self.transition.fps.to_string();
        run("swww", self.img_args(path, &duration, &fps)).await?;
        Ok(())
    }

    async fn get(&self) -> Result<PathBuf> {
        let output = run("swww", ["query"]).await?;
        parse_query_output(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| Error::NotFound("swww reports no image wallpaper".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_output() {
        let out = "DP-1: 2560x1440, scale: 1, currently displaying: image: /home/u/walls/a.jpg\n\
                   HDMI-A-1: 1920x1080, scale: 1, currently displaying: image: /home/u/walls/b.jpg\n";
        assert_eq!(parse_query_output(out), Some(PathBuf::from("/home/u/walls/a.jpg")));
        assert_eq!(parse_query_output("DP-1: 2560x1440, currently displaying: color: 000000"), None);
    }

    #[test]
    fn test_img_args() {
        let setter = SwwwSetter::new(Transition::default(), ResizeMode::Fit);
        let args = setter.img_args(Path::new("/w/a.png"), "1", "60");
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "img",
                "/w/a.png",
                "--resize",
                "fit",
                "--transition-type",
                "fade",
                "--transition-duration",
                "1",
                "--transition-fps",
                "60"
            ]
        );
    }
}
