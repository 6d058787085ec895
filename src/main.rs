#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

use anyhow::{anyhow, Result};
use cookies_export::config::ExportOptions;
use cookies_export::{gui, logging, VERSION};

fn main() -> Result<()> {
    logging::init();
    log::info!("cookies-export {}", VERSION);

    let options = ExportOptions::default();
    log::debug!("Interface language: {}", options.language);

    gui::run_gui(options).map_err(|e| anyhow!("Failed to open the export window: {}", e))
}
