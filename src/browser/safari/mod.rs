//! Safari browser cookie extraction
//!
//! Safari keeps cookies in a `Cookies.binarycookies` file instead of SQLite.
//! The parser is platform independent; locating the default file only
//! works on macOS.

mod binarycookies;

use crate::browser::{map_cookie_io_error, CookieStore};
use crate::config::BrowserCookieConfig;
use crate::error::{ExportError, Result};
use crate::utils::FileUtils;
use std::fs;
use std::path::PathBuf;

pub(crate) use binarycookies::parse_binary_cookies;

/// Extract cookies from Safari browser
pub fn extract_cookies(config: &BrowserCookieConfig) -> Result<CookieStore> {
    let path = safari_cookie_path(config.profile.as_deref())?;
    log::debug!("Reading Safari cookies from {:?}", path);

    let data = fs::read(&path).map_err(|e| {
        map_cookie_io_error(
            "Failed to read Safari cookies",
            &path,
            e,
            Some("Grant Full Disk Access to this application and try again."),
        )
    })?;

    let mut store = CookieStore::new();
    for cookie in parse_binary_cookies(&data)? {
        store.entry(cookie.domain.clone()).or_default().push(cookie);
    }
    Ok(store)
}

/// Resolve the binarycookies file, honouring an explicit file path.
fn safari_cookie_path(profile: Option<&str>) -> Result<PathBuf> {
    if let Some(profile) = profile.filter(|p| FileUtils::is_path_like(p)) {
        let path = FileUtils::expand_path(profile)?;
        if path.is_file() {
            return Ok(path);
        }
        return Err(ExportError::FileNotFound(format!(
            "Safari cookies file not found at {:?}",
            path
        )));
    }
    default_cookie_path()
}

#[cfg(target_os = "macos")]
fn default_cookie_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
    let candidates = [
        home.join("Library/Cookies/Cookies.binarycookies"),
        home.join(
            "Library/Containers/com.apple.Safari/Data/Library/Cookies/Cookies.binarycookies",
        ),
    ];
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| {
            ExportError::FileNotFound(format!(
                "Safari cookies file not found in {:?}",
                candidates
            ))
        })
}

#[cfg(not(target_os = "macos"))]
fn default_cookie_path() -> Result<PathBuf> {
    Err(ExportError::Unsupported(
        "Safari is only available on macOS".to_string(),
    ))
}
