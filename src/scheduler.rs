//! Background refresh thread.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::engine::ClassificationEngine;

/// How often the thread wakes to check whether a refresh is due.
pub const DEFAULT_TICK: Duration = Duration::from_secs(15 * 60);

/// Periodically runs [`ClassificationEngine::refresh_if_needed`].
///
/// Each list set is re-downloaded only when its interval has elapsed, so the
/// tick merely bounds how late a refresh may start.
pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Start the refresh thread. The first check runs immediately.
    pub fn spawn(engine: Arc<ClassificationEngine>, tick: Duration) -> io::Result<SchedulerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("adgate-refresh".to_string())
            .spawn(move || loop {
                if engine.refresh_if_needed() {
                    log::info!("Scheduled refresh completed ({})", engine.status().as_str());
                }
                match shutdown_rx.recv_timeout(tick) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(SchedulerHandle {
            shutdown_tx,
            handle: Some(handle),
        })
    }
}

/// Stops the refresh thread when stopped or dropped.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal the thread and wait for it. An in-flight download finishes first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Refresh thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
