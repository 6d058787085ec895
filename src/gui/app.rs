use super::fonts;
use super::state::{Dialog, DialogKind, ExportState, WorkerEvent};
use super::worker::spawn_export;
use crate::backend::CookieBackend;
use crate::config::{Browser, ExportOptions, DEFAULT_COOKIE_FILE_NAME};
use crate::i18n;
use crate::utils::FileUtils;
use eframe::egui::{self, Align2, Color32, RichText};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct ExportApp {
    state: ExportState,
    options: ExportOptions,
    backend: Arc<dyn CookieBackend>,
    events: Option<UnboundedReceiver<WorkerEvent>>,
}

impl ExportApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        backend: Arc<dyn CookieBackend>,
        options: ExportOptions,
    ) -> Self {
        fonts::install_cjk_fallback(&cc.egui_ctx);
        Self {
            state: ExportState::new(options.language.clone()),
            options,
            backend,
            events: None,
        }
    }

    fn t(&self, key: &str) -> String {
        i18n::text(self.state.lang(), key)
    }

    fn drain_events(&mut self) {
        let Some(rx) = self.events.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(event) => self.state.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    if self.state.exporting {
                        log::error!("Export worker exited without reporting a result");
                        self.state.apply(WorkerEvent::Finished(Some(
                            "The export worker stopped unexpectedly".to_string(),
                        )));
                    }
                    break;
                }
            }
        }
    }

    fn start_export(&mut self, ctx: &egui::Context) {
        let Some(request) = self.state.begin_export() else {
            return;
        };
        log::info!("Exporting {} cookies to {}", request.browser, request.cookie_file);
        let repaint_ctx = ctx.clone();
        match spawn_export(
            self.backend.clone(),
            self.options.clone(),
            request,
            move || repaint_ctx.request_repaint(),
        ) {
            Ok(rx) => self.events = Some(rx),
            Err(err) => {
                log::error!("Failed to start export worker: {}", err);
                self.state.apply(WorkerEvent::Finished(Some(err.to_string())));
            }
        }
    }

    fn browse(&mut self) {
        let dialog = rfd::FileDialog::new()
            .set_title(self.t("file-dialog-title"))
            .set_directory(FileUtils::dialog_directory(&self.state.path))
            .set_file_name(DEFAULT_COOKIE_FILE_NAME)
            .add_filter(self.t("filter-netscape"), &["txt"])
            .add_filter(self.t("filter-all"), &["*"]);
        if let Some(path) = dialog.save_file() {
            self.state.path = path.display().to_string();
        }
    }

    fn main_panel(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        egui::Grid::new("export-form")
            .num_columns(3)
            .spacing([8.0, 8.0])
            .show(ui, |ui| {
                ui.label(self.t("label-browser"));
                egui::ComboBox::from_id_salt("browser")
                    .selected_text(self.state.browser.as_str())
                    .show_ui(ui, |ui| {
                        for browser in Browser::ALL {
                            ui.selectable_value(&mut self.state.browser, browser, browser.as_str());
                        }
                    });
                ui.end_row();

                ui.label(self.t("label-path"));
                ui.add(
                    egui::TextEdit::singleline(&mut self.state.path)
                        .desired_width(ui.available_width() - 90.0),
                );
                if ui.button(self.t("button-browse")).clicked() {
                    self.browse();
                }
                ui.end_row();
            });

        ui.add_space(8.0);
        let export_button = egui::Button::new(self.t("button-export"));
        if ui.add_enabled(!self.state.exporting, export_button).clicked() {
            self.start_export(ctx);
        }
        if self.state.exporting {
            ui.spinner();
        }

        ui.add_space(8.0);
        ui.label(self.t("label-log"));
        let transcript = self.state.log.join("\n");
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut transcript.as_str())
                        .desired_width(f32::INFINITY)
                        .font(egui::TextStyle::Monospace),
                );
            });
    }

    fn show_dialog(&mut self, ctx: &egui::Context, dialog: &Dialog) {
        let color = match dialog.kind {
            DialogKind::Info => ctx.style().visuals.text_color(),
            DialogKind::Warning => Color32::from_rgb(0xd0, 0x90, 0x20),
            DialogKind::Error => ctx.style().visuals.error_fg_color,
        };
        let ok = self.t("button-ok");
        let mut dismissed = false;
        egui::Window::new(dialog.title.as_str())
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(RichText::new(dialog.body.as_str()).color(color));
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    if ui.button(ok).clicked() {
                        dismissed = true;
                    }
                });
            });
        if dismissed {
            self.state.dismiss_dialog();
        }
    }
}

impl eframe::App for ExportApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        let dialog = self.state.dialog.clone();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(dialog.is_none(), |ui| self.main_panel(ui, ctx));
        });
        if let Some(dialog) = dialog {
            self.show_dialog(ctx, &dialog);
        }
    }
}
