use super::{run, ThemeDetector, WallpaperSetter};
use crate::datasource::Theme;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const BACKGROUND_SCHEMA: &str = "org.gnome.desktop.background";
const INTERFACE_SCHEMA: &str = "org.gnome.desktop.interface";

/// GNOME background via gsettings (both light and dark URIs)
pub struct GnomeSetter;

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// `'file:///home/u/a.jpg'` -> `/home/u/a.jpg`
fn parse_uri(raw: &str) -> Option<PathBuf> {
    let uri = raw.trim().trim_matches('\'');
    uri.strip_prefix("file://")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

#[async_trait]
impl WallpaperSetter for GnomeSetter {
    fn name(&self) -> &'static str {
        "gnome"
    }

    async fn set(&self, path: &Path) -> Result<()> {
        let uri = file_uri(path);
        for key in ["picture-uri", "picture-uri-dark"] {
            run("gsettings", ["set", BACKGROUND_SCHEMA, key, uri.as_str()]).await?;
        }
        Ok(())
    }

    async fn get(&self) -> Result<PathBuf> {
        let output = run("gsettings", ["get", BACKGROUND_SCHEMA, "picture-uri"]).await?;
        parse_uri(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| Error::NotFound("GNOME background is not a local file".to_string()))
    }
}

/// Reads the desktop color scheme preference
pub struct GsettingsTheme;

fn parse_color_scheme(raw: &str) -> Theme {
    if raw.contains("prefer-dark") {
        Theme::Dark
    } else {
        Theme::Light
    }
}

#[async_trait]
impl ThemeDetector for GsettingsTheme {
    async fn detect(&self) -> Theme {
        match run("gsettings", ["get", INTERFACE_SCHEMA, "color-scheme"]).await {
            Ok(output) => parse_color_scheme(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                tracing::debug!(error = %e, "theme detection failed, assuming light");
                Theme::Light
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri() {
        assert_eq!(
            parse_uri("'file:///home/u/a.jpg'\n"),
            Some(PathBuf::from("/home/u/a.jpg"))
        );
        assert_eq!(parse_uri("''"), None);
        assert_eq!(parse_uri("'resource:///x'"), None);
    }

    #[test]
    fn test_parse_color_scheme() {
        assert_eq!(parse_color_scheme("'prefer-dark'\n"), Theme::Dark);
        assert_eq!(parse_color_scheme("'default'\n"), Theme::Light);
        assert_eq!(parse_color_scheme("'prefer-light'"), Theme::Light);
    }

    #[test]
    fn test_file_uri() {
        assert_eq!(file_uri(Path::new("/w/a b.jpg")), "file:///w/a b.jpg");
    }
}
