//! Configuration management for cookies-export

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use unic_langid::LanguageIdentifier;

use crate::error::{ExportError, Result};

/// Page used to trigger the simulated metadata extraction.
pub const DEFAULT_TRIGGER_URL: &str = "https://www.bilibili.com/video/BV1AM4y1M71p/";

/// Default file name offered for the exported cookie file.
pub const DEFAULT_COOKIE_FILE_NAME: &str = "cookies.txt";

/// Browser types supported for cookie extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Browser {
    Brave,
    #[default]
    Chrome,
    Chromium,
    Edge,
    Firefox,
    Opera,
    Safari,
    Vivaldi,
    Whale,
}

impl Browser {
    /// Every supported browser, in the order shown to the user.
    pub const ALL: [Browser; 9] = [
        Browser::Brave,
        Browser::Chrome,
        Browser::Chromium,
        Browser::Edge,
        Browser::Firefox,
        Browser::Opera,
        Browser::Safari,
        Browser::Vivaldi,
        Browser::Whale,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Browser::Brave => "brave",
            Browser::Chrome => "chrome",
            Browser::Chromium => "chromium",
            Browser::Edge => "edge",
            Browser::Firefox => "firefox",
            Browser::Opera => "opera",
            Browser::Safari => "safari",
            Browser::Vivaldi => "vivaldi",
            Browser::Whale => "whale",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Browser {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "brave" => Ok(Browser::Brave),
            "chrome" => Ok(Browser::Chrome),
            "chromium" => Ok(Browser::Chromium),
            "edge" => Ok(Browser::Edge),
            "firefox" => Ok(Browser::Firefox),
            "opera" => Ok(Browser::Opera),
            "safari" => Ok(Browser::Safari),
            "vivaldi" => Ok(Browser::Vivaldi),
            "whale" => Ok(Browser::Whale),
            _ => Err(()),
        }
    }
}

/// Browser cookie configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookieConfig {
    pub browser: Browser,
    pub profile: Option<String>,
    pub container: Option<String>,
    pub keyring: Option<String>,
}

impl BrowserCookieConfig {
    /// Config for the browser's default profile.
    pub fn new(browser: Browser) -> Self {
        Self {
            browser,
            profile: None,
            container: None,
            keyring: None,
        }
    }

    /// Parse from the format BROWSER[+KEYRING][:PROFILE][::CONTAINER]
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (browser_part, container) = match input.split_once("::") {
            Some((head, container)) => (head, Some(container.to_string())),
            None => (input, None),
        };

        let (browser_keyring_part, profile) = match browser_part.split_once(':') {
            Some((head, profile)) => (head, Some(profile.to_string())),
            None => (browser_part, None),
        };

        let (browser_str, keyring) = match browser_keyring_part.split_once('+') {
            Some((browser, keyring)) => (browser, Some(keyring.to_string())),
            None => (browser_keyring_part, None),
        };

        let browser = browser_str.parse::<Browser>().map_err(|_| {
            ExportError::Config(format!("Unsupported browser: {}", browser_str))
        })?;

        Ok(BrowserCookieConfig {
            browser,
            profile: profile.filter(|p| !p.is_empty()),
            container: container.filter(|c| !c.is_empty()),
            keyring: keyring.filter(|k| !k.is_empty()),
        })
    }
}

/// How the simulated metadata extraction touches the trigger URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeMode {
    /// Match the jar against the URL without any network traffic.
    Offline,
    /// Send a HEAD request carrying the matching cookies.
    Online { timeout: Duration },
}

/// Settings for one export attempt
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub trigger_url: String,
    pub probe: ProbeMode,
    pub language: LanguageIdentifier,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            trigger_url: DEFAULT_TRIGGER_URL.to_string(),
            probe: ProbeMode::Offline,
            language: crate::i18n::resolve_language(),
        }
    }
}
