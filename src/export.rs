//! Export flow: browser cookies to a Netscape cookie file
//!
//! [`export_cookies`] drives a [`CookieBackend`] through one session and
//! reports the outcome as an optional user-facing error message. It never
//! panics and never returns a raw error type, so the caller can hand the
//! result straight to a dialog.

use crate::backend::{CookieBackend, CookieSession, Logger, SessionParams};
use crate::config::{BrowserCookieConfig, ExportOptions};
use crate::error::ExportError;
use crate::i18n;
use crate::session::NativeBackend;
use crate::utils::FileUtils;
use std::fmt;
use std::sync::Arc;
use unic_langid::LanguageIdentifier;

/// Receives every transcript line produced during an export.
pub type LogCallback = Arc<dyn Fn(String) + Send + Sync>;

const LOCKED_MARKERS: [&str; 3] = ["cookie", "could not copy", "permission"];

/// Export the cookies of `browser` to `cookie_file`.
///
/// Returns `None` on success, otherwise the message to show the user.
pub fn export_cookies(
    backend: &dyn CookieBackend,
    options: &ExportOptions,
    browser: &str,
    cookie_file: &str,
    log: LogCallback,
) -> Option<String> {
    let lang = &options.language;

    if let Err(err) = backend.ensure_available() {
        let detail = error_text(&err);
        return Some(i18n::text_with(
            lang,
            "export-backend-unavailable",
            &[("detail", detail.as_str())],
        ));
    }

    let browser = browser.trim();
    let cookie_file = cookie_file.trim();
    if browser.is_empty() || cookie_file.is_empty() {
        return Some(i18n::text(lang, "export-missing-input"));
    }

    let cookies_from_browser = match BrowserCookieConfig::parse(browser) {
        Ok(config) => config,
        Err(err) => return Some(error_text(&err)),
    };
    let target = match FileUtils::absolute_path(cookie_file) {
        Ok(path) => path,
        Err(err) => return Some(error_text(&err)),
    };
    let target_display = target.display().to_string();

    emit(&log, i18n::text_with(lang, "export-reading", &[("browser", browser)]));

    let params = SessionParams {
        cookie_file: target,
        cookies_from_browser,
        simulate: true,
        probe: options.probe.clone(),
        logger: Arc::new(CallbackLogger::new(log.clone(), lang.clone())),
    };

    let session = match backend.open(params) {
        Ok(session) => session,
        Err(err) => return Some(classify_failure(lang, browser, &err)),
    };
    let mut guard = SessionGuard::new(session);

    emit(&log, i18n::text(lang, "export-triggering"));
    if let Err(err) = guard.session().extract_info(&options.trigger_url, false) {
        let message = classify_failure(lang, browser, &err);
        if let Err(close_err) = guard.finish() {
            log::warn!("Closing the session after a failed export: {}", close_err);
            let detail = error_text(&close_err);
            emit(
                &log,
                i18n::text_with(lang, "log-warning", &[("message", detail.as_str())]),
            );
        }
        return Some(message);
    }

    if let Err(err) = guard.finish() {
        return Some(error_text(&err));
    }

    emit(
        &log,
        i18n::text_with(lang, "export-saved", &[("path", target_display.as_str())]),
    );
    None
}

/// [`export_cookies`] against the native backend with default options.
pub fn export_cookies_native(browser: &str, cookie_file: &str, log: LogCallback) -> Option<String> {
    export_cookies(&NativeBackend::new(), &ExportOptions::default(), browser, cookie_file, log)
}

/// Closes the wrapped session exactly once, on `finish` or on drop.
pub struct SessionGuard {
    session: Box<dyn CookieSession>,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn CookieSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub fn session(&mut self) -> &mut dyn CookieSession {
        self.session.as_mut()
    }

    /// Close the session and report the close error, if any.
    pub fn finish(mut self) -> crate::error::Result<()> {
        self.closed = true;
        self.session.close()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(err) = self.session.close() {
                log::warn!("Failed to close cookie session: {}", err);
            }
        }
    }
}

/// Forwards engine output to the transcript callback.
struct CallbackLogger {
    log: LogCallback,
    lang: LanguageIdentifier,
}

impl CallbackLogger {
    fn new(log: LogCallback, lang: LanguageIdentifier) -> Self {
        Self { log, lang }
    }
}

impl Logger for CallbackLogger {
    fn debug(&self, message: &str) {
        log::debug!("{}", message);
        (self.log)(message.to_string());
    }

    fn info(&self, message: &str) {
        log::info!("{}", message);
        (self.log)(message.to_string());
    }

    fn warning(&self, message: &str) {
        log::warn!("{}", message);
        (self.log)(i18n::text_with(&self.lang, "log-warning", &[("message", message)]));
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
        (self.log)(i18n::text_with(&self.lang, "log-error", &[("message", message)]));
    }
}

fn emit(log: &LogCallback, line: String) {
    log::info!("{}", line);
    log(line);
}

/// Trimmed display text, or the debug form when the display text is empty.
fn error_text<E: fmt::Display + fmt::Debug>(err: &E) -> String {
    let text = err.to_string().trim().to_string();
    if text.is_empty() {
        format!("{:?}", err)
    } else {
        text
    }
}

/// Turn an extraction failure into the message shown to the user.
///
/// Failures that look like a locked or unreadable cookie store get a hint to
/// close the browser, followed by the raw error.
pub fn classify_failure(lang: &LanguageIdentifier, browser: &str, err: &ExportError) -> String {
    let text = error_text(err);
    let lowered = text.to_lowercase();
    if LOCKED_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        format!(
            "{}\n\n{}",
            i18n::text_with(lang, "export-browser-locked", &[("browser", browser)]),
            text
        )
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_failure, error_text, SessionGuard};
    use crate::backend::{CookieSession, ExtractInfo};
    use crate::error::{ExportError, Result};
    use crate::i18n::english;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSession(Arc<AtomicUsize>);

    impl CookieSession for CountingSession {
        fn extract_info(&mut self, url: &str, _download: bool) -> Result<ExtractInfo> {
            Ok(ExtractInfo {
                url: url.to_string(),
                matched_cookies: 0,
                status: None,
            })
        }

        fn close(&mut self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn classify_failure_adds_close_browser_hint() {
        let err = ExportError::PermissionDenied("Cookies DB".to_string());
        let message = classify_failure(&english(), "firefox", &err);
        assert!(message.starts_with("Could not read the browser cookies. Close firefox"));
        assert!(message.ends_with("\n\nPermission denied: Cookies DB"));
    }

    #[test]
    fn classify_failure_passes_other_errors_through() {
        let err = ExportError::InvalidUrl("bad".to_string());
        assert_eq!(classify_failure(&english(), "chrome", &err), "Invalid URL: bad");
    }

    #[derive(Debug)]
    struct Silent;

    impl fmt::Display for Silent {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Ok(())
        }
    }

    #[test]
    fn error_text_trims_surrounding_whitespace() {
        let err = ExportError::Runtime("boom \n".to_string());
        assert_eq!(error_text(&err), "Async runtime error: boom");

        let err = ExportError::Runtime("a  b".to_string());
        assert_eq!(error_text(&err), "Async runtime error: a  b");
    }

    #[test]
    fn error_text_falls_back_to_debug_when_display_is_empty() {
        assert_eq!(error_text(&Silent), "Silent");
    }

    #[test]
    fn session_guard_closes_once_on_finish() {
        let closes = Arc::new(AtomicUsize::new(0));
        let guard = SessionGuard::new(Box::new(CountingSession(closes.clone())));
        guard.finish().expect("close");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_guard_closes_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = SessionGuard::new(Box::new(CountingSession(closes.clone())));
            guard
                .session()
                .extract_info("https://example.com/", false)
                .expect("info");
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
