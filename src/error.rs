//! Error types for the selection pipeline.
//!
//! Command-level code works with `anyhow`; everything below the CLI returns
//! [`Error`] so callers can match on the failure kind (fallback between local
//! and remote sources depends on it).

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A source or provider lacks the configuration it needs.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Directory, source identifier or file is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// No eligible images for the requested theme.
    #[error("no images available: {0}")]
    Empty(String),

    /// Remote gallery returned an error status, bad payload, or nothing at all.
    #[error("{provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    /// Neither local nor remote sources could produce an image.
    #[error("no sources could provide a wallpaper: {0}")]
    NoSources(String),

    #[error("state file error: {0}")]
    State(#[from] serde_json::Error),
}

impl Error {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it concerns.
    pub fn io(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context: format!("{} {}", action, path.display()),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
