//! Terminal input thread and application event channel.
//!
//! [`EventHandler`] runs crossterm's blocking `poll()` on an OS thread so it
//! cannot starve the async runtime. Fetch results arrive on the same channel
//! from tokio tasks, so the main loop applies every message in arrival order.

use crate::app::{ChecksSnapshot, JobSteps};
use crate::error::FetchError;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// What a re-run request was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerunTarget {
    Job(String),
    Run(String),
}

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Tick,
    /// Terminal resized; cached log lines are width dependent.
    Resize,
    /// One logical poll: every page of check contexts, aggregated.
    ChecksFetched(Result<ChecksSnapshot, FetchError>),
    RunStepsFetched {
        run_id: String,
        result: Result<Vec<JobSteps>, FetchError>,
    },
    /// Raw log blob; parsed on the loop when applied.
    JobLogsFetched {
        job_id: String,
        result: Result<String, FetchError>,
    },
    CheckOutputFetched {
        job_id: String,
        result: Result<String, FetchError>,
    },
    RerunFinished {
        target: RerunTarget,
        result: Result<(), FetchError>,
    },
    /// Global toast, auto-dismisses after `ERROR_TTL_SECS`.
    Error(String),
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();

        let thread = std::thread::spawn(move || {
            while !shutdown_flag.load(Ordering::Relaxed) {
                match event::poll(tick_rate) {
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::Error(format!("Terminal poll error: {e}")));
                        break;
                    }
                    Ok(false) => {
                        if event_tx.send(AppEvent::Tick).is_err() {
                            break;
                        }
                        continue;
                    }
                    Ok(true) => {}
                }
                let sent = match event::read() {
                    Ok(CrosstermEvent::Key(key)) => event_tx.send(AppEvent::Key(key)),
                    Ok(CrosstermEvent::Resize(..)) => event_tx.send(AppEvent::Resize),
                    // EINTR: retry silently
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(()),
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::Error(format!("Terminal read error: {e}")));
                        break;
                    }
                    Ok(_) => Ok(()),
                };
                if sent.is_err() {
                    break;
                }
            }
        });

        Self {
            rx,
            tx,
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if let Err(panic_payload) = handle.join() {
                let msg = panic_payload.downcast::<String>().map_or_else(
                    |p| {
                        p.downcast::<&str>()
                            .map_or_else(|_| "unknown panic".to_string(), |s| s.to_string())
                    },
                    |s| *s,
                );
                tracing::error!("event thread panicked: {msg}");
            }
        }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        // Signal only; joining here can deadlock if poll() blocks during unwinding.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
