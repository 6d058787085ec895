//! Contract between the export flow and the cookie extraction engine
//!
//! The export flow never reads browser files itself. It configures a
//! session through [`SessionParams`], asks it to run one simulated
//! extraction, and closes it. Closing a session is what flushes the cookie
//! jar to disk.

use crate::config::{BrowserCookieConfig, ProbeMode};
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Sink for the engine's progress and diagnostic lines
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Options a session is opened with
#[derive(Clone)]
pub struct SessionParams {
    /// Netscape cookie file written when the session closes
    pub cookie_file: PathBuf,
    pub cookies_from_browser: BrowserCookieConfig,
    /// Only resolve metadata, never download content
    pub simulate: bool,
    pub probe: ProbeMode,
    pub logger: Arc<dyn Logger>,
}

impl std::fmt::Debug for SessionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionParams")
            .field("cookie_file", &self.cookie_file)
            .field("cookies_from_browser", &self.cookies_from_browser)
            .field("simulate", &self.simulate)
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

/// Metadata returned by a simulated extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractInfo {
    pub url: String,
    /// Cookies the jar would send with a request to `url`
    pub matched_cookies: usize,
    /// HTTP status of the online probe, if one was made
    pub status: Option<u16>,
}

pub trait CookieBackend: Send + Sync {
    /// Fails when the engine cannot be used at all.
    fn ensure_available(&self) -> Result<()>;

    fn open(&self, params: SessionParams) -> Result<Box<dyn CookieSession>>;
}

pub trait CookieSession: Send {
    fn extract_info(&mut self, url: &str, download: bool) -> Result<ExtractInfo>;

    /// Release the session and persist the cookie jar.
    fn close(&mut self) -> Result<()>;
}
