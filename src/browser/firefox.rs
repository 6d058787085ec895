//! Firefox browser cookie extraction

use crate::browser::{copy_to_temp, find_files, map_cookie_io_error, newest_path, Cookie, CookieStore};
use crate::config::BrowserCookieConfig;
use crate::error::{ExportError, Result};
use crate::utils::FileUtils;
use rusqlite::{Connection, Row};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const MAX_SUPPORTED_DB_SCHEMA_VERSION: i64 = 17;

/// Extract cookies from Firefox browser
pub fn extract_cookies(config: &BrowserCookieConfig) -> Result<CookieStore> {
    let search_roots = firefox_search_roots(config.profile.as_deref())?;
    let cookie_db = newest_path(find_cookie_dbs(&search_roots)).ok_or_else(|| {
        ExportError::FileNotFound(format!(
            "Firefox cookies database not found in {:?}",
            search_roots
        ))
    })?;
    log::debug!("Reading Firefox cookies from {:?}", cookie_db);

    let temp_dir = tempdir()
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to create temp dir: {}", e)))?;
    let temp_db = copy_to_temp(&cookie_db, temp_dir.path(), "firefox-cookies.sqlite", None)?;

    let conn = Connection::open(&temp_db)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to open cookies DB: {}", e)))?;
    let schema_version = read_schema_version(&conn);
    if schema_version > MAX_SUPPORTED_DB_SCHEMA_VERSION {
        log::warn!(
            "Firefox cookie DB schema version {} may be unsupported",
            schema_version
        );
    }

    let columns = cookie_columns(&conn)?;
    let container_mode = resolve_container(&cookie_db, config.container.as_deref())?;
    let select = format!(
        "SELECT host, name, value, path, {}, {}, {} FROM moz_cookies",
        columns.expiry, columns.secure, columns.http_only
    );

    let mut store = CookieStore::new();
    let mut push = |row: &Row<'_>| -> Result<()> {
        let cookie = row_to_cookie(row, schema_version)?;
        store.entry(cookie.domain.clone()).or_default().push(cookie);
        Ok(())
    };

    let map_query_err =
        |e: rusqlite::Error| ExportError::BrowserCookie(format!("Failed to query Firefox cookies: {}", e));
    match container_mode {
        ContainerMode::Any => {
            let mut stmt = conn.prepare(&select).map_err(map_query_err)?;
            let mut rows = stmt.query([]).map_err(map_query_err)?;
            while let Some(row) = rows.next().map_err(map_query_err)? {
                push(row)?;
            }
        }
        ContainerMode::NoneOnly => {
            let query = format!(
                "{} WHERE NOT INSTR(originAttributes, 'userContextId=')",
                select
            );
            let mut stmt = conn.prepare(&query).map_err(map_query_err)?;
            let mut rows = stmt.query([]).map_err(map_query_err)?;
            while let Some(row) = rows.next().map_err(map_query_err)? {
                push(row)?;
            }
        }
        ContainerMode::Specific(id) => {
            let query = format!(
                "{} WHERE originAttributes LIKE ?1 OR originAttributes LIKE ?2",
                select
            );
            let mut stmt = conn.prepare(&query).map_err(map_query_err)?;
            let mut rows = stmt
                .query([
                    format!("%userContextId={}", id),
                    format!("%userContextId={}&%", id),
                ])
                .map_err(map_query_err)?;
            while let Some(row) = rows.next().map_err(map_query_err)? {
                push(row)?;
            }
        }
    }

    if store.is_empty() {
        return Err(ExportError::BrowserCookie(
            "No Firefox cookies could be extracted".to_string(),
        ));
    }

    Ok(store)
}

fn firefox_search_roots(profile: Option<&str>) -> Result<Vec<PathBuf>> {
    if let Some(profile) = profile {
        if FileUtils::is_path_like(profile) {
            return Ok(vec![FileUtils::expand_path(profile)?]);
        }
    }

    let bases = firefox_profile_bases()?;
    Ok(match profile {
        Some(profile) => bases.into_iter().map(|base| base.join(profile)).collect(),
        None => bases,
    })
}

#[cfg(target_os = "linux")]
fn firefox_profile_bases() -> Result<Vec<PathBuf>> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
    Ok(vec![
        home.join(".mozilla/firefox"),
        home.join("snap/firefox/common/.mozilla/firefox"),
        home.join(".var/app/org.mozilla.firefox/.mozilla/firefox"),
    ])
}

#[cfg(target_os = "macos")]
fn firefox_profile_bases() -> Result<Vec<PathBuf>> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
    Ok(vec![home.join("Library/Application Support/Firefox/Profiles")])
}

#[cfg(target_os = "windows")]
fn firefox_profile_bases() -> Result<Vec<PathBuf>> {
    let appdata = std::env::var("APPDATA")
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join("AppData/Roaming")))
        .ok_or_else(|| ExportError::Config("Cannot determine APPDATA".to_string()))?;
    Ok(vec![appdata.join("Mozilla/Firefox/Profiles")])
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn firefox_profile_bases() -> Result<Vec<PathBuf>> {
    Err(ExportError::Unsupported(
        "Firefox profile discovery is only implemented for macOS, Linux, and Windows".to_string(),
    ))
}

fn find_cookie_dbs(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut results = Vec::new();
    for root in roots {
        if root.is_file() && root.ends_with("cookies.sqlite") {
            results.push(root.clone());
        } else if root.is_dir() {
            results.extend(find_files(root, "cookies.sqlite"));
        }
    }
    results
}

fn read_schema_version(conn: &Connection) -> i64 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap_or(0)
}

struct CookieColumns {
    expiry: &'static str,
    secure: &'static str,
    http_only: &'static str,
}

fn cookie_columns(conn: &Connection) -> Result<CookieColumns> {
    let mut stmt = conn
        .prepare("PRAGMA table_info(moz_cookies)")
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row.map_err(|e| {
            ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e))
        })?);
    }
    let has = |name: &str| columns.iter().any(|c| c == name);

    let expiry = if has("expiry") {
        "expiry"
    } else if has("expires") {
        "expires"
    } else {
        return Err(ExportError::BrowserCookie(
            "Firefox cookies table missing expiry column".to_string(),
        ));
    };
    let secure = if has("is_secure") { "is_secure" } else { "isSecure" };
    let http_only = if has("isHttpOnly") {
        "isHttpOnly"
    } else if has("is_http_only") {
        "is_http_only"
    } else {
        "0"
    };
    Ok(CookieColumns {
        expiry,
        secure,
        http_only,
    })
}

fn row_to_cookie(row: &Row<'_>, schema_version: i64) -> Result<Cookie> {
    let domain: String = row
        .get(0)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie host: {}", e)))?;
    let name: String = row
        .get(1)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie name: {}", e)))?;
    let value: String = row
        .get(2)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie value: {}", e)))?;
    let path: String = row
        .get(3)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie path: {}", e)))?;
    let expiry: Option<i64> = row
        .get(4)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie expiry: {}", e)))?;
    let secure: i64 = row.get(5).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to read cookie secure flag: {}", e))
    })?;
    let http_only: i64 = row.get(6).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to read cookie http-only flag: {}", e))
    })?;

    Ok(Cookie {
        name,
        value,
        domain,
        path,
        secure: secure != 0,
        http_only: http_only != 0,
        expires: firefox_expiry_to_unix_seconds(expiry, schema_version),
    })
}

/// Schema 16 switched `expiry` from seconds to milliseconds.
fn firefox_expiry_to_unix_seconds(expiry: Option<i64>, schema_version: i64) -> Option<i64> {
    let seconds = match expiry? {
        ms if schema_version >= 16 => ms / 1000,
        seconds => seconds,
    };
    (seconds > 0).then_some(seconds)
}

#[derive(Debug, PartialEq, Eq)]
enum ContainerMode {
    Any,
    NoneOnly,
    Specific(i64),
}

#[derive(Deserialize)]
struct ContainersFile {
    #[serde(default)]
    identities: Vec<ContainerIdentity>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerIdentity {
    name: Option<String>,
    #[serde(rename = "l10nID")]
    l10n_id: Option<String>,
    user_context_id: Option<i64>,
}

fn resolve_container(cookie_db: &Path, container: Option<&str>) -> Result<ContainerMode> {
    let container = match container {
        Some(container) => container,
        None => return Ok(ContainerMode::Any),
    };
    if container == "none" {
        return Ok(ContainerMode::NoneOnly);
    }

    let containers_path = cookie_db
        .parent()
        .map(|path| path.join("containers.json"))
        .ok_or_else(|| ExportError::BrowserCookie("Firefox profile path not found".to_string()))?;
    if !containers_path.is_file() {
        return Err(ExportError::FileNotFound(
            "Firefox containers.json not found".to_string(),
        ));
    }

    let data = fs::read_to_string(&containers_path).map_err(|e| {
        map_cookie_io_error("Failed to read containers.json", &containers_path, e, None)
    })?;
    find_container_id(&serde_json::from_str(&data)?, container)
        .map(ContainerMode::Specific)
        .ok_or_else(|| {
            ExportError::BrowserCookie(format!("Firefox container '{}' not found", container))
        })
}

fn find_container_id(file: &ContainersFile, container: &str) -> Option<i64> {
    file.identities.iter().find_map(|identity| {
        let matches = identity.name.as_deref() == Some(container)
            || l10n_matches(container, identity.l10n_id.as_deref());
        if matches {
            identity.user_context_id
        } else {
            None
        }
    })
}

fn l10n_matches(container: &str, l10n_id: Option<&str>) -> bool {
    l10n_id
        .and_then(|id| id.strip_prefix("userContext"))
        .and_then(|id| id.strip_suffix(".label"))
        == Some(container)
}
