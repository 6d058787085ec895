//! In-memory cookie jar and Netscape cookie file output

use crate::browser::{Cookie, CookieStore};
use crate::error::{ExportError, Result};
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use url::Url;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";
const GENERATOR_COMMENT: &str = "# This file is generated by cookies-export. Do not edit.";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Flattened cookie collection with a stable order
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    /// Flatten a per-domain store, ordered by domain, path, then name.
    pub fn from_store(store: CookieStore) -> Self {
        let mut cookies: Vec<Cookie> = store.into_values().flatten().collect();
        cookies.sort_by(|a, b| {
            (&a.domain, &a.path, &a.name).cmp(&(&b.domain, &b.path, &b.name))
        });
        Self { cookies }
    }

    pub(crate) fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Cookies a browser would send with a request to `url`.
    pub fn cookies_for_url(&self, url: &Url) -> Vec<&Cookie> {
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return Vec::new(),
        };
        let is_https = url.scheme() == "https";
        let now = unix_now();

        self.cookies
            .iter()
            .filter(|cookie| domain_matches(&cookie.domain, &host))
            .filter(|cookie| path_matches(&cookie.path, url.path()))
            .filter(|cookie| is_https || !cookie.secure)
            .filter(|cookie| cookie.expires.map_or(true, |expires| expires > now))
            .collect()
    }

    /// Render the jar in the Netscape cookie file format.
    pub fn to_netscape(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", NETSCAPE_HEADER);
        let _ = writeln!(out, "{}", GENERATOR_COMMENT);
        out.push('\n');
        for cookie in &self.cookies {
            let _ = writeln!(out, "{}", netscape_line(cookie));
        }
        out
    }

    /// Write the jar to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(self.to_netscape().as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| {
            ExportError::Io(std::io::Error::new(
                e.error.kind(),
                format!("Failed to write {:?}: {}", path, e.error),
            ))
        })?;
        log::debug!("Wrote {} cookies to {:?}", self.cookies.len(), path);
        Ok(())
    }
}

/// Cookie header value for the given cookies
pub fn cookies_to_header(cookies: &[&Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

fn netscape_line(cookie: &Cookie) -> String {
    let domain = if cookie.http_only {
        format!("{}{}", HTTP_ONLY_PREFIX, cookie.domain)
    } else {
        cookie.domain.clone()
    };
    let path = if cookie.path.is_empty() { "/" } else { cookie.path.as_str() };
    let expires = cookie.expires.unwrap_or(0).to_string();
    let fields: [&str; 7] = [
        &domain,
        flag(cookie.domain.starts_with('.')),
        path,
        flag(cookie.secure),
        &expires,
        &cookie.name,
        &cookie.value,
    ];
    fields.join("\t")
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// A leading dot means the cookie applies to subdomains too.
fn domain_matches(cookie_domain: &str, host: &str) -> bool {
    let cookie_domain = cookie_domain.to_ascii_lowercase();
    match cookie_domain.strip_prefix('.') {
        Some(base) => {
            host == base
                || host
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => host == cookie_domain,
    }
}

fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if cookie_path.is_empty() || cookie_path == "/" || cookie_path == request_path {
        return true;
    }
    match request_path.strip_prefix(cookie_path) {
        Some(rest) => cookie_path.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
