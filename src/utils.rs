//! Utility functions and helpers

use crate::config::DEFAULT_COOKIE_FILE_NAME;
use crate::error::{ExportError, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// URL validation and parsing utilities
pub struct UrlUtils;

impl UrlUtils {
    /// Validate and normalize URL
    pub fn validate_url(input: &str) -> Result<Url> {
        let input = input.trim();
        // Scheme-less trigger URLs are treated as https
        let url_str = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };

        let url = Url::parse(&url_str)
            .map_err(|e| ExportError::InvalidUrl(format!("Invalid URL '{}': {}", input, e)))?;
        if url.host_str().is_none() {
            return Err(ExportError::InvalidUrl(format!(
                "Invalid URL '{}': missing host",
                input
            )));
        }
        Ok(url)
    }

    /// Extract domain from URL for cookie filtering
    pub fn extract_domain(url: &Url) -> Option<String> {
        url.domain().map(|d| d.to_ascii_lowercase())
    }
}

/// File system utilities
pub struct FileUtils;

impl FileUtils {
    /// Expand tilde (~) in file paths
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        let rest = match path.strip_prefix('~') {
            Some(rest) => rest,
            None => return Ok(PathBuf::from(path)),
        };
        if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\')) {
            // ~user forms are left alone
            return Ok(PathBuf::from(path));
        }
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
        let rest = rest.trim_start_matches(['/', '\\']);
        if rest.is_empty() {
            Ok(home_dir)
        } else {
            Ok(home_dir.join(rest))
        }
    }

    /// Expand `~` and make the path absolute against the working directory.
    pub fn absolute_path(path: &str) -> Result<PathBuf> {
        let expanded = Self::expand_path(path.trim())?;
        Ok(std::path::absolute(&expanded)?)
    }

    /// `cookies.txt` in the user's home directory.
    pub fn default_cookie_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_COOKIE_FILE_NAME)
    }

    /// Directory a save dialog should open in for the given path.
    pub fn dialog_directory(current: &str) -> PathBuf {
        let parent = Path::new(current.trim())
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty() && parent.is_dir());
        match parent {
            Some(parent) => parent.to_path_buf(),
            None => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Whether a user-supplied profile value names a path rather than a profile.
    pub fn is_path_like(value: &str) -> bool {
        value.contains('/') || value.contains('\\') || value.starts_with('~')
    }
}

#[cfg(test)]
mod tests;
