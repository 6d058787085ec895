use super::{FileUtils, UrlUtils};
use crate::error::ExportError;
use std::fs;
use tempfile::tempdir;
use url::Url;

#[test]
fn validate_url_adds_https_scheme() {
    let url = UrlUtils::validate_url("bilibili.com/video/BV1AM4y1M71p/").expect("valid url");
    assert_eq!(url.scheme(), "https");
    assert_eq!(url.host_str(), Some("bilibili.com"));
    assert_eq!(url.path(), "/video/BV1AM4y1M71p/");
}

#[test]
fn validate_url_rejects_invalid_input() {
    let err = UrlUtils::validate_url("http://").expect_err("invalid url");
    assert!(matches!(err, ExportError::InvalidUrl(_)));
}

#[test]
fn extract_domain_handles_ip_and_hostname() {
    let hostname = Url::parse("http://Example.com/path").expect("valid url");
    assert_eq!(
        UrlUtils::extract_domain(&hostname),
        Some("example.com".to_string())
    );
    let ip = Url::parse("http://127.0.0.1/").expect("valid url");
    assert_eq!(UrlUtils::extract_domain(&ip), None);
}

#[test]
fn expand_path_expands_home() {
    let home = dirs::home_dir().expect("home dir");
    let path = FileUtils::expand_path("~/cookies-export-test").expect("expanded");
    assert_eq!(path, home.join("cookies-export-test"));
    assert_eq!(FileUtils::expand_path("~").expect("home"), home);
}

#[test]
fn expand_path_leaves_other_paths() {
    let path = FileUtils::expand_path("relative/cookies.txt").expect("path");
    assert_eq!(path, std::path::PathBuf::from("relative/cookies.txt"));
    let path = FileUtils::expand_path("~other/cookies.txt").expect("path");
    assert_eq!(path, std::path::PathBuf::from("~other/cookies.txt"));
}

#[test]
fn absolute_path_resolves_relative_input() {
    let path = FileUtils::absolute_path("cookies.txt").expect("absolute");
    assert!(path.is_absolute());
    assert!(path.ends_with("cookies.txt"));
}

#[test]
fn default_cookie_path_lives_in_home() {
    let path = FileUtils::default_cookie_path();
    assert_eq!(
        path.file_name().and_then(|name| name.to_str()),
        Some("cookies.txt")
    );
}

#[test]
fn dialog_directory_prefers_existing_parent() {
    let temp = tempdir().expect("tempdir");
    let file = temp.path().join("cookies.txt");
    fs::write(&file, "").expect("write");
    let dir = FileUtils::dialog_directory(&file.to_string_lossy());
    assert_eq!(dir, temp.path());

    let fallback = FileUtils::dialog_directory("cookies.txt");
    assert_eq!(Some(fallback), dirs::home_dir());
}

#[test]
fn is_path_like_detects_paths() {
    assert!(FileUtils::is_path_like("~/Library"));
    assert!(FileUtils::is_path_like("C:\\Users\\user"));
    assert!(FileUtils::is_path_like("/tmp/file"));
    assert!(!FileUtils::is_path_like("Profile 1"));
}
