use crate::config::Browser;
use crate::i18n;
use crate::utils::FileUtils;
use unic_langid::LanguageIdentifier;

/// Messages sent from the export worker to the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Log(String),
    /// `None` on success, otherwise the message to show.
    Finished(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: String,
    pub body: String,
}

/// What a worker needs to run one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub browser: String,
    pub cookie_file: String,
}

/// Window state, kept apart from rendering
#[derive(Debug)]
pub struct ExportState {
    pub browser: Browser,
    pub path: String,
    pub log: Vec<String>,
    pub exporting: bool,
    pub dialog: Option<Dialog>,
    target: Option<String>,
    lang: LanguageIdentifier,
}

impl ExportState {
    pub fn new(lang: LanguageIdentifier) -> Self {
        Self {
            browser: Browser::default(),
            path: FileUtils::default_cookie_path().display().to_string(),
            log: Vec::new(),
            exporting: false,
            dialog: None,
            target: None,
            lang,
        }
    }

    pub fn lang(&self) -> &LanguageIdentifier {
        &self.lang
    }

    /// Start an export if the inputs allow it.
    ///
    /// An empty path opens a warning dialog instead. Nothing starts while a
    /// previous export is still running.
    pub fn begin_export(&mut self) -> Option<ExportRequest> {
        if self.exporting {
            return None;
        }
        let path = self.path.trim().to_string();
        if path.is_empty() {
            self.dialog = Some(Dialog {
                kind: DialogKind::Warning,
                title: i18n::text(&self.lang, "dialog-notice-title"),
                body: i18n::text(&self.lang, "dialog-choose-path"),
            });
            return None;
        }

        self.log.clear();
        self.exporting = true;
        self.target = Some(
            FileUtils::absolute_path(&path)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| path.clone()),
        );
        Some(ExportRequest {
            browser: self.browser.as_str().to_string(),
            cookie_file: path,
        })
    }

    pub fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Log(line) => self.log.push(line),
            WorkerEvent::Finished(result) => {
                self.exporting = false;
                let target = self.target.take().unwrap_or_default();
                self.dialog = Some(match result {
                    None => Dialog {
                        kind: DialogKind::Info,
                        title: i18n::text(&self.lang, "dialog-done-title"),
                        body: format!("{}\n{}", i18n::text(&self.lang, "dialog-done-body"), target),
                    },
                    Some(message) => Dialog {
                        kind: DialogKind::Error,
                        title: i18n::text(&self.lang, "dialog-failed-title"),
                        body: message,
                    },
                });
            }
        }
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = None;
    }
}
