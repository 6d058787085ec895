//! Native cookie extraction engine
//!
//! [`NativeBackend`] reads cookies straight from the browser profile on this
//! machine. The jar is loaded on the first extraction and written to the
//! configured cookie file when the session closes.

use crate::backend::{CookieBackend, CookieSession, ExtractInfo, SessionParams};
use crate::browser::BrowserCookieExtractor;
use crate::config::ProbeMode;
use crate::error::{ExportError, Result};
use crate::jar::{cookies_to_header, CookieJar};
use crate::utils::UrlUtils;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use url::Url;

const HEAD_USER_AGENT: &str = concat!("cookies-export/", env!("CARGO_PKG_VERSION"));

/// Backend that extracts cookies from locally installed browsers
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CookieBackend for NativeBackend {
    fn ensure_available(&self) -> Result<()> {
        if cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
            Ok(())
        } else {
            Err(ExportError::Unsupported(format!(
                "Browser cookie extraction is not available on {}",
                std::env::consts::OS
            )))
        }
    }

    fn open(&self, params: SessionParams) -> Result<Box<dyn CookieSession>> {
        params.logger.debug(&format!(
            "Opening cookie session for {} -> {:?}",
            params.cookies_from_browser.browser, params.cookie_file
        ));
        Ok(Box::new(NativeSession::new(params)))
    }
}

pub struct NativeSession {
    params: SessionParams,
    jar: Option<CookieJar>,
    runtime: Option<Runtime>,
    closed: bool,
}

impl NativeSession {
    pub fn new(params: SessionParams) -> Self {
        Self {
            params,
            jar: None,
            runtime: None,
            closed: false,
        }
    }

    fn load_jar(&mut self) -> Result<&CookieJar> {
        if self.jar.is_none() {
            let config = self.params.cookies_from_browser.clone();
            let browser = config.browser;
            self.params
                .logger
                .info(&format!("Extracting cookies from {}", browser));
            let store = BrowserCookieExtractor::new(config).extract_cookies()?;
            let jar = CookieJar::from_store(store);
            self.params
                .logger
                .info(&format!("Extracted {} cookies from {}", jar.len(), browser));
            self.jar = Some(jar);
        }
        self.jar
            .as_ref()
            .ok_or_else(|| ExportError::Runtime("Cookie jar was not loaded".to_string()))
    }

    fn runtime(&mut self) -> Result<&Runtime> {
        if self.runtime.is_none() {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ExportError::Runtime(format!("Failed to start runtime: {}", e)))?;
            self.runtime = Some(runtime);
        }
        self.runtime
            .as_ref()
            .ok_or_else(|| ExportError::Runtime("Runtime was not started".to_string()))
    }

    /// Send a HEAD request carrying `cookie_header` and return the status.
    ///
    /// The client is built and driven inside the session runtime, since its
    /// timers need a reactor.
    fn head_status(&mut self, url: &Url, cookie_header: String, timeout: Duration) -> Result<u16> {
        let url = url.clone();
        let response = self.runtime()?.block_on(async move {
            let client = build_head_client(timeout)?;
            let mut request = client.head(url.as_str());
            if !cookie_header.is_empty() {
                request = request.header(reqwest::header::COOKIE, cookie_header);
            }
            request.send().await.map_err(ExportError::Http)
        })?;
        Ok(response.status().as_u16())
    }
}

impl CookieSession for NativeSession {
    fn extract_info(&mut self, url: &str, download: bool) -> Result<ExtractInfo> {
        if self.closed {
            return Err(ExportError::Runtime("Session is already closed".to_string()));
        }
        if download || !self.params.simulate {
            return Err(ExportError::Unsupported(
                "Downloading content is not supported".to_string(),
            ));
        }

        let url = UrlUtils::validate_url(url)?;
        let logger = self.params.logger.clone();
        logger.debug(&format!("Resolving metadata for {}", url));

        let (matched, header) = {
            let jar = self.load_jar()?;
            let matched = jar.cookies_for_url(&url);
            (matched.len(), cookies_to_header(&matched))
        };
        let domain = UrlUtils::extract_domain(&url).unwrap_or_else(|| url.to_string());
        logger.info(&format!("{} cookies apply to {}", matched, domain));

        let status = match self.params.probe.clone() {
            ProbeMode::Offline => None,
            ProbeMode::Online { timeout } => {
                let status = self.head_status(&url, header, timeout)?;
                logger.info(&format!("{} responded with HTTP {}", domain, status));
                if status >= 400 {
                    logger.warning(&format!("Probe request returned HTTP {}", status));
                }
                Some(status)
            }
        };

        Ok(ExtractInfo {
            url: url.to_string(),
            matched_cookies: matched,
            status,
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.runtime = None;

        match &self.jar {
            Some(jar) => {
                jar.save(&self.params.cookie_file)?;
                self.params.logger.debug(&format!(
                    "Saved {} cookies to {:?}",
                    jar.len(),
                    self.params.cookie_file
                ));
            }
            None => self
                .params
                .logger
                .debug("No cookies were loaded; cookie file left untouched"),
        }
        Ok(())
    }
}

fn build_head_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(HEAD_USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(ExportError::Http)
}

#[cfg(test)]
mod tests {
    use super::{NativeBackend, NativeSession};
    use crate::backend::{CookieBackend, CookieSession, Logger, SessionParams};
    use crate::config::{Browser, BrowserCookieConfig, ProbeMode};
    use crate::error::ExportError;
    use rusqlite::Connection;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingLogger(Mutex<Vec<String>>);

    impl Logger for RecordingLogger {
        fn debug(&self, message: &str) {
            self.0.lock().expect("lock").push(format!("debug: {}", message));
        }
        fn info(&self, message: &str) {
            self.0.lock().expect("lock").push(format!("info: {}", message));
        }
        fn warning(&self, message: &str) {
            self.0.lock().expect("lock").push(format!("warning: {}", message));
        }
        fn error(&self, message: &str) {
            self.0.lock().expect("lock").push(format!("error: {}", message));
        }
    }

    fn params(cookie_file: PathBuf, profile: &str) -> SessionParams {
        let mut config = BrowserCookieConfig::new(Browser::Firefox);
        config.profile = Some(profile.to_string());
        SessionParams {
            cookie_file,
            cookies_from_browser: config,
            simulate: true,
            probe: ProbeMode::Offline,
            logger: Arc::new(RecordingLogger::default()),
        }
    }

    fn online_params(
        cookie_file: PathBuf,
        db_path: &Path,
        logger: Arc<RecordingLogger>,
    ) -> SessionParams {
        let mut params = params(cookie_file, &db_path.to_string_lossy());
        params.probe = ProbeMode::Online {
            timeout: Duration::from_secs(5),
        };
        params.logger = logger as Arc<dyn Logger>;
        params
    }

    fn create_firefox_db(path: &Path, host: &str) {
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

    #[test]
    fn native_backend_is_available_on_desktop_platforms() {
        assert!(NativeBackend::new().ensure_available().is_ok());
    }

    #[test]
    fn download_requests_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let mut session = NativeSession::new(params(temp.path().join("c.txt"), "/missing"));
        let err = session
            .extract_info("https://example.com/", true)
            .expect_err("download");
        assert!(matches!(err, ExportError::Unsupported(_)));
    }

    #[test]
    fn close_without_jar_leaves_no_file_and_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("cookies.txt");
        let mut session = NativeSession::new(params(target.clone(), "/missing/profile"));

        let err = session
            .extract_info("https://example.com/", false)
            .expect_err("missing profile");
        assert!(matches!(err, ExportError::FileNotFound(_)));

        session.close().expect("close");
        session.close().expect("second close");
        assert!(!target.exists());
        assert!(session.extract_info("https://example.com/", false).is_err());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn online_mode_sends_head_request_with_matching_cookies() {
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

        let temp = tempdir().expect("tempdir");
        let db_path = temp.path().join("cookies.sqlite");
        create_firefox_db(&db_path, "127.0.0.1");
        let target = temp.path().join("cookies.txt");
        let logger = Arc::new(RecordingLogger::default());
        let mut session =
            NativeSession::new(online_params(target.clone(), &db_path, logger.clone()));

        let info = session
            .extract_info(&format!("{}/watch", server.uri()), false)
            .expect("extract info");
        assert_eq!(info.status, Some(204));
        assert_eq!(info.matched_cookies, 1);
        assert!(logger
            .0
            .lock()
            .expect("lock")
            .iter()
            .any(|line| line.ends_with("responded with HTTP 204")));

        session.close().expect("close");
        let text = fs::read_to_string(&target).expect("cookie file");
        assert!(text.contains("127.0.0.1\tFALSE\t/\tFALSE\t0\tsession\tabc"));

        rt.block_on(server.verify());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn online_mode_reports_unreachable_host_as_http_error() {
        let temp = tempdir().expect("tempdir");
        let db_path = temp.path().join("cookies.sqlite");
        create_firefox_db(&db_path, "127.0.0.1");
        let target = temp.path().join("cookies.txt");
        let mut session = NativeSession::new(online_params(
            target.clone(),
            &db_path,
            Arc::new(RecordingLogger::default()),
        ));

        // Port 9 (discard) is closed on test machines
        let err = session
            .extract_info("http://127.0.0.1:9/", false)
            .expect_err("unreachable host");
        assert!(matches!(err, ExportError::Http(_)));

        session.close().expect("close");
        assert!(target.exists());
    }
}
