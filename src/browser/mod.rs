//! Browser cookie extraction module
//!
//! This module handles extracting cookies from various browsers
//! across different operating systems.

use crate::config::{Browser, BrowserCookieConfig};
use crate::error::{ExportError, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod chrome;
pub mod firefox;
pub mod safari;

/// Represents a browser cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix seconds; `None` for session cookies.
    pub expires: Option<i64>,
}

/// Cookies grouped by the domain they were stored under
pub type CookieStore = HashMap<String, Vec<Cookie>>;

/// Main interface for extracting browser cookies
pub struct BrowserCookieExtractor {
    config: BrowserCookieConfig,
}

impl BrowserCookieExtractor {
    /// Create a new cookie extractor with the given configuration
    pub fn new(config: BrowserCookieConfig) -> Self {
        Self { config }
    }

    /// Read every cookie the configured browser profile holds
    pub fn extract_cookies(&self) -> Result<CookieStore> {
        use chrome::ChromiumBrowser;

        let chromium = |browser| chrome::extract_chromium_cookies(browser, &self.config);
        match self.config.browser {
            Browser::Chrome => chromium(ChromiumBrowser::Chrome),
            Browser::Chromium => chromium(ChromiumBrowser::Chromium),
            Browser::Edge => chromium(ChromiumBrowser::Edge),
            Browser::Brave => chromium(ChromiumBrowser::Brave),
            Browser::Opera => chromium(ChromiumBrowser::Opera),
            Browser::Vivaldi => chromium(ChromiumBrowser::Vivaldi),
            Browser::Whale => chromium(ChromiumBrowser::Whale),
            Browser::Firefox => firefox::extract_cookies(&self.config),
            Browser::Safari => safari::extract_cookies(&self.config),
        }
    }
}

/// Turn an I/O failure on a browser-owned file into a cookie error.
///
/// Locked or unreadable profile files are reported with a hint so the
/// caller can tell the user to close the browser.
pub(crate) fn map_cookie_io_error(
    context: &str,
    path: &Path,
    err: io::Error,
    hint: Option<&str>,
) -> ExportError {
    let hint = hint.unwrap_or("Close the browser and try again.");
    match err.kind() {
        io::ErrorKind::PermissionDenied => {
            ExportError::PermissionDenied(format!("{} {:?}: {}. {}", context, path, err, hint))
        }
        io::ErrorKind::NotFound => {
            ExportError::FileNotFound(format!("{} {:?}: {}", context, path, err))
        }
        _ => ExportError::BrowserCookie(format!(
            "Could not access {:?} ({}): {}. {}",
            path, context, err, hint
        )),
    }
}

/// Copy a possibly locked browser database next to a scratch directory.
pub(crate) fn copy_to_temp(
    source: &Path,
    temp_dir: &Path,
    file_name: &str,
    hint: Option<&str>,
) -> Result<PathBuf> {
    let target = temp_dir.join(file_name);
    fs::copy(source, &target)
        .map_err(|e| map_cookie_io_error("Failed to copy cookies DB", source, e, hint))?;
    Ok(target)
}

/// Walk `root` and collect every file called `filename`.
pub(crate) fn find_files(root: &Path, filename: &str) -> Vec<PathBuf> {
    let mut matches = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!("Skipping unreadable directory {:?}: {}", dir, err);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().and_then(|name| name.to_str()) == Some(filename) {
                matches.push(path);
            }
        }
    }
    matches
}

/// Most recently modified path, used to pick the active profile.
pub(crate) fn newest_path(paths: Vec<PathBuf>) -> Option<PathBuf> {
    paths
        .into_iter()
        .filter_map(|path| {
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::{find_files, map_cookie_io_error, newest_path};
    use crate::error::ExportError;
    use std::fs;
    use std::io;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn map_cookie_io_error_classifies_kinds() {
        let path = Path::new("/profile/Cookies");
        let err = map_cookie_io_error(
            "Failed to copy cookies DB",
            path,
            io::Error::from(io::ErrorKind::PermissionDenied),
            None,
        );
        assert!(matches!(err, ExportError::PermissionDenied(_)));
        assert!(err.to_string().contains("Close the browser"));

        let err = map_cookie_io_error(
            "Failed to copy cookies DB",
            path,
            io::Error::from(io::ErrorKind::NotFound),
            None,
        );
        assert!(matches!(err, ExportError::FileNotFound(_)));

        let err = map_cookie_io_error(
            "Failed to copy cookies DB",
            path,
            io::Error::new(io::ErrorKind::Other, "sharing violation"),
            Some("Close the browser or run without elevation."),
        );
        assert!(matches!(err, ExportError::BrowserCookie(_)));
        assert!(err.to_string().contains("Could not access"));
        assert!(err.to_string().contains("without elevation"));
    }

    #[test]
    fn find_files_walks_nested_directories() {
        let temp = tempdir().expect("tempdir");
        let nested = temp.path().join("Default").join("Network");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("Cookies"), b"db").expect("write");
        fs::write(temp.path().join("Cookies-journal"), b"j").expect("write");

        let found = find_files(temp.path(), "Cookies");
        assert_eq!(found, vec![nested.join("Cookies")]);
        assert!(find_files(&temp.path().join("missing"), "Cookies").is_empty());
    }

    #[test]
    fn newest_path_ignores_missing_files() {
        let temp = tempdir().expect("tempdir");
        let existing = temp.path().join("cookies.sqlite");
        fs::write(&existing, b"db").expect("write");
        let newest = newest_path(vec![temp.path().join("gone.sqlite"), existing.clone()]);
        assert_eq!(newest, Some(existing));
        assert_eq!(newest_path(Vec::new()), None);
    }
}
