//! Chrome/Chromium browser cookie extraction
//!
//! The SQLite layout is shared by every Chromium-based browser; only the
//! data directory and the value encryption differ per platform.

use crate::browser::{copy_to_temp, find_files, newest_path, Cookie, CookieStore};
use crate::config::BrowserCookieConfig;
use crate::error::{ExportError, Result};
use crate::utils::FileUtils;
use rusqlite::{Connection, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

#[cfg(any(target_os = "linux", target_os = "macos"))]
mod aes_cbc;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

/// Seconds between 1601-01-01 (Chromium epoch) and 1970-01-01.
const WINDOWS_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Supported Chromium-based browsers on macOS, Linux, and Windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromiumBrowser {
    Chrome,
    Chromium,
    Edge,
    Brave,
    Opera,
    Vivaldi,
    Whale,
}

/// Where a Chromium browser keeps its profiles and secrets.
pub(crate) struct ChromiumSettings {
    pub user_data_dir: PathBuf,
    /// Keyring label on Linux, Keychain account on macOS; unused on Windows.
    #[cfg_attr(target_os = "windows", allow(dead_code))]
    pub keyring_name: &'static str,
    pub supports_profiles: bool,
}

/// Decrypts the `encrypted_value` column of a cookie row.
pub(crate) trait CookieDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String>;
}

pub fn extract_chromium_cookies(
    browser: ChromiumBrowser,
    config: &BrowserCookieConfig,
) -> Result<CookieStore> {
    #[cfg(target_os = "linux")]
    {
        let settings = linux::chromium_settings(browser)?;
        let cookie_db = find_cookie_database(&settings, config.profile.as_deref())?;
        read_cookie_database(&cookie_db, None, |meta_version| {
            linux::LinuxChromeCookieDecryptor::new(&settings, meta_version, config.keyring.as_deref())
        })
    }
    #[cfg(target_os = "macos")]
    {
        let settings = macos::chromium_settings(browser)?;
        let cookie_db = find_cookie_database(&settings, config.profile.as_deref())?;
        read_cookie_database(&cookie_db, None, |meta_version| {
            macos::MacChromeCookieDecryptor::new(&settings, meta_version)
        })
    }
    #[cfg(target_os = "windows")]
    {
        let settings = windows::chromium_settings(browser)?;
        let cookie_db = find_cookie_database(&settings, config.profile.as_deref())?;
        read_cookie_database(
            &cookie_db,
            Some("Close the browser or run without elevation."),
            |meta_version| windows::WindowsChromeCookieDecryptor::new(&settings, meta_version),
        )
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = (browser, config);
        Err(ExportError::Unsupported(
            "Chromium cookie extraction is only implemented for macOS, Linux, and Windows"
                .to_string(),
        ))
    }
}

#[cfg_attr(
    not(any(target_os = "macos", target_os = "linux", target_os = "windows")),
    allow(dead_code)
)]
pub(crate) fn find_cookie_database(
    settings: &ChromiumSettings,
    profile: Option<&str>,
) -> Result<PathBuf> {
    let search_root = if let Some(profile) = profile {
        if FileUtils::is_path_like(profile) {
            let expanded = FileUtils::expand_path(profile)?;
            if expanded.is_file() {
                return Ok(expanded);
            }
            expanded
        } else if settings.supports_profiles {
            settings.user_data_dir.join(profile)
        } else {
            log::warn!("Profile selection is not supported for this browser");
            settings.user_data_dir.clone()
        }
    } else {
        settings.user_data_dir.clone()
    };

    if !search_root.exists() {
        return Err(ExportError::FileNotFound(format!(
            "Browser data dir not found: {:?}",
            search_root
        )));
    }

    newest_path(find_files(&search_root, "Cookies")).ok_or_else(|| {
        ExportError::FileNotFound(format!(
            "Chromium cookies database not found under {:?}",
            search_root
        ))
    })
}

/// Read a `Cookies` database through a private copy.
pub(crate) fn read_cookie_database<D, F>(
    cookie_db: &Path,
    io_hint: Option<&str>,
    make_decryptor: F,
) -> Result<CookieStore>
where
    D: CookieDecryptor,
    F: FnOnce(i64) -> Result<D>,
{
    let temp_dir = tempdir()
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to create temp dir: {}", e)))?;
    let temp_db = copy_to_temp(cookie_db, temp_dir.path(), "chromium-cookies.sqlite", io_hint)?;

    let conn = Connection::open(&temp_db)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to open cookies DB: {}", e)))?;
    let meta_version = read_meta_version(&conn);
    let column_names = read_cookie_columns(&conn)?;
    let secure_column = if column_names.contains("is_secure") {
        "is_secure"
    } else {
        "secure"
    };
    let httponly_column = if column_names.contains("is_httponly") {
        "is_httponly"
    } else if column_names.contains("httponly") {
        "httponly"
    } else {
        "0"
    };

    let decryptor = make_decryptor(meta_version)?;
    let query = format!(
        "SELECT host_key, name, value, encrypted_value, path, expires_utc, {}, {} FROM cookies",
        secure_column, httponly_column
    );

    let mut stmt = conn.prepare(&query).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to prepare cookie query: {}", e))
    })?;
    let mut rows = stmt
        .query([])
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to query cookies: {}", e)))?;

    let mut store = CookieStore::new();
    let mut undecryptable = 0usize;
    while let Some(row) = rows
        .next()
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie row: {}", e)))?
    {
        match row_to_cookie(row, &decryptor)? {
            Some(cookie) => store.entry(cookie.domain.clone()).or_default().push(cookie),
            None => undecryptable += 1,
        }
    }

    if undecryptable > 0 {
        log::warn!("Skipped {} cookies that could not be decrypted", undecryptable);
    }
    if store.is_empty() {
        return Err(ExportError::BrowserCookie(
            "No Chromium cookies could be extracted".to_string(),
        ));
    }

    Ok(store)
}

fn read_meta_version(conn: &Connection) -> i64 {
    let result: std::result::Result<String, _> =
        conn.query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
            row.get(0)
        });
    result
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn read_cookie_columns(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("PRAGMA table_info(cookies)")
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let mut columns = HashSet::new();
    for row in rows {
        let name = row.map_err(|e| {
            ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e))
        })?;
        columns.insert(name);
    }
    if columns.is_empty() {
        return Err(ExportError::BrowserCookie(
            "Chromium cookies table not found".to_string(),
        ));
    }
    Ok(columns)
}

fn row_to_cookie<D: CookieDecryptor>(row: &Row<'_>, decryptor: &D) -> Result<Option<Cookie>> {
    let host_key: String = row
        .get(0)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie host: {}", e)))?;
    let name: String = row
        .get(1)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie name: {}", e)))?;
    let value: String = row
        .get(2)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie value: {}", e)))?;
    let encrypted_value = read_encrypted_value(row)?;
    let path: String = row
        .get(4)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie path: {}", e)))?;
    let expires_utc: i64 = row
        .get(5)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie expiry: {}", e)))?;
    let secure: i64 = row.get(6).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to read cookie secure flag: {}", e))
    })?;
    let http_only: i64 = row.get(7).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to read cookie httponly flag: {}", e))
    })?;

    let cookie_value = if !value.is_empty() {
        value
    } else if !encrypted_value.is_empty() {
        match decryptor.decrypt(&encrypted_value) {
            Some(value) => value,
            None => return Ok(None),
        }
    } else {
        // Empty cookies are legal
        String::new()
    };

    Ok(Some(Cookie {
        name,
        value: cookie_value,
        domain: host_key,
        path,
        secure: secure != 0,
        http_only: http_only != 0,
        expires: chromium_expires_to_unix_seconds(expires_utc),
    }))
}

fn read_encrypted_value(row: &Row<'_>) -> Result<Vec<u8>> {
    let value = row.get_ref(3).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to read cookie ciphertext: {}", e))
    })?;
    match value {
        rusqlite::types::ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
        rusqlite::types::ValueRef::Text(text) => Ok(text.to_vec()),
        rusqlite::types::ValueRef::Null => Ok(Vec::new()),
        _ => Err(ExportError::BrowserCookie(
            "Unsupported cookie ciphertext type".to_string(),
        )),
    }
}

pub(crate) fn chromium_expires_to_unix_seconds(expires_utc: i64) -> Option<i64> {
    if expires_utc == 0 {
        return None;
    }
    let unix_seconds = (expires_utc / 1_000_000) - WINDOWS_EPOCH_OFFSET_SECS;
    if unix_seconds <= 0 {
        None
    } else {
        Some(unix_seconds)
    }
}

/// Strip the SHA-256 host digest that databases from meta version 24 on
/// prepend to every plaintext, then decode as UTF-8.
#[cfg_attr(
    not(any(target_os = "macos", target_os = "linux", target_os = "windows")),
    allow(dead_code)
)]
pub(crate) fn decode_cookie_value(plaintext: &[u8], meta_version: i64) -> Option<String> {
    let trimmed = if meta_version >= 24 && plaintext.len() >= 32 {
        &plaintext[32..]
    } else {
        plaintext
    };
    String::from_utf8(trimmed.to_vec()).ok()
}
