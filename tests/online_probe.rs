#![cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]

use cookies_export::config::{ExportOptions, ProbeMode};
use cookies_export::export_cookies;
use cookies_export::i18n::english;
use cookies_export::session::NativeBackend;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_firefox_cookie_db(path: &Path, host: &str) {
    let conn = Connection::open(path).expect("open firefox db");
    conn.execute("PRAGMA user_version = 16", [])
        .expect("set schema version");
    conn.execute(
        "CREATE TABLE moz_cookies (
            host TEXT,
            name TEXT,
            value TEXT,
            path TEXT,
            expiry INTEGER,
            isSecure INTEGER,
            isHttpOnly INTEGER
        )",
        [],
    )
    .expect("create moz_cookies");
    conn.execute(
        "INSERT INTO moz_cookies (host, name, value, path, expiry, isSecure, isHttpOnly)
         VALUES (?1, 'session', 'abc', '/', 0, 0, 0)",
        [host],
    )
    .expect("insert cookie");
}

#[cfg_attr(miri, ignore)]
#[test]
fn online_probe_sends_matching_cookies() {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("HEAD"))
            .and(path("/watch"))
            .and(header("cookie", "session=abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server),
    );

    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("cookies.sqlite");
    create_firefox_cookie_db(&db_path, "127.0.0.1");
    let target = dir.path().join("cookies.txt");

    let options = ExportOptions {
        trigger_url: format!("{}/watch", server.uri()),
        probe: ProbeMode::Online {
            timeout: Duration::from_secs(5),
        },
        language: english(),
    };
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let result = export_cookies(
        &NativeBackend::new(),
        &options,
        &format!("firefox:{}", db_path.to_string_lossy()),
        target.to_string_lossy().as_ref(),
        Arc::new(move |line: String| sink.lock().expect("lock").push(line)),
    );

    assert_eq!(result, None);
    let lines = lines.lock().expect("lock");
    assert!(lines
        .iter()
        .any(|line| line.contains("responded with HTTP 204")));
    let text = fs::read_to_string(&target).expect("cookie file");
    assert!(text.contains("127.0.0.1\tFALSE\t/\tFALSE\t0\tsession\tabc"));

    rt.block_on(server.verify());
}

#[cfg_attr(miri, ignore)]
#[test]
fn unreachable_probe_target_is_reported_and_file_still_written() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("cookies.sqlite");
    create_firefox_cookie_db(&db_path, ".example.com");
    let target = dir.path().join("cookies.txt");

    let options = ExportOptions {
        // Port 9 (discard) is closed on test machines
        trigger_url: "http://127.0.0.1:9/".to_string(),
        probe: ProbeMode::Online {
            timeout: Duration::from_secs(2),
        },
        language: english(),
    };
    let result = export_cookies(
        &NativeBackend::new(),
        &options,
        &format!("firefox:{}", db_path.to_string_lossy()),
        target.to_string_lossy().as_ref(),
        Arc::new(|_line: String| {}),
    );

    let message = result.expect("probe error");
    assert!(message.starts_with("HTTP error"));
    assert!(target.exists());
}
