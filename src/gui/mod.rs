//! Desktop window for exporting browser cookies
//!
//! - `state`: rendering-free window state ([`ExportState`])
//! - `worker`: background export thread and its event channel
//! - `app`: the `eframe::App` drawing the window and dialogs
//! - `fonts`: CJK fallback font so translated text renders

mod app;
mod fonts;
pub mod state;
pub mod worker;

pub use state::{Dialog, DialogKind, ExportRequest, ExportState, WorkerEvent};

use crate::backend::CookieBackend;
use crate::config::ExportOptions;
use crate::i18n;
use crate::session::NativeBackend;
use app::ExportApp;
use eframe::egui;
use std::sync::Arc;

/// Open the window and block until it is closed.
pub fn run_gui(options: ExportOptions) -> eframe::Result<()> {
    run_gui_with_backend(Arc::new(NativeBackend::new()), options)
}

pub fn run_gui_with_backend(
    backend: Arc<dyn CookieBackend>,
    options: ExportOptions,
) -> eframe::Result<()> {
    let title = i18n::text(&options.language, "window-title");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(title.clone())
            .with_inner_size([560.0, 380.0])
            .with_min_inner_size([400.0, 280.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        native_options,
        Box::new(move |cc| Ok(Box::new(ExportApp::new(cc, backend, options)))),
    )
}
