use super::state::{ExportRequest, WorkerEvent};
use crate::backend::CookieBackend;
use crate::config::ExportOptions;
use crate::export::export_cookies;
use std::io;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Run one export on a detached thread.
///
/// Events arrive on the returned receiver; `wake` is called after each one
/// so the UI loop can drain them.
pub fn spawn_export<W>(
    backend: Arc<dyn CookieBackend>,
    options: ExportOptions,
    request: ExportRequest,
    wake: W,
) -> io::Result<UnboundedReceiver<WorkerEvent>>
where
    W: Fn() + Send + Sync + 'static,
{
    let (tx, rx) = unbounded_channel();
    let wake = Arc::new(wake);

    thread::Builder::new()
        .name("cookie-export".to_string())
        .spawn(move || {
            let log_tx = tx.clone();
            let log_wake = wake.clone();
            let log = Arc::new(move |line: String| {
                // The UI may already be gone
                let _ = log_tx.send(WorkerEvent::Log(line));
                log_wake();
            });

            let result = export_cookies(
                backend.as_ref(),
                &options,
                &request.browser,
                &request.cookie_file,
                log,
            );
            let _ = tx.send(WorkerEvent::Finished(result));
            wake();
        })?;

    Ok(rx)
}
