//! cookies-export - export browser cookies to a Netscape cookies.txt file
//!
//! The crate reads the cookie store of a locally installed browser, runs one
//! simulated request against a trigger URL and writes the resulting cookie
//! jar in the Netscape format understood by curl, wget and yt-dlp.

pub mod backend;
pub mod browser;
pub mod config;
pub mod error;
pub mod export;
pub mod gui;
pub mod i18n;
pub mod jar;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{ExportError, Result};
pub use export::{export_cookies, export_cookies_native};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
