//! Background polling loop and the one-shot fetch helpers it shares with the
//! event loop.
//!
//! The poller fetches every page of check contexts, aggregates them and sends
//! one [`AppEvent::ChecksFetched`] per round. A `watch` channel wakes it early
//! for a manual refresh without restarting the task.

use crate::aggregate::aggregate;
use crate::app::{ChecksSnapshot, JobKind, PullRequestInfo};
use crate::error::FetchError;
use crate::events::{AppEvent, RerunTarget};
use crate::gh::parser;
use crate::traits::HostClient;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time;

pub struct Poller {
    client: Arc<dyn HostClient>,
    pr: u64,
    interval: u64,
    tx: mpsc::UnboundedSender<AppEvent>,
    refresh_rx: watch::Receiver<()>,
}

impl Poller {
    pub fn new(
        client: Arc<dyn HostClient>,
        pr: u64,
        interval: u64,
        tx: mpsc::UnboundedSender<AppEvent>,
        refresh_rx: watch::Receiver<()>,
    ) -> Self {
        Self {
            client,
            pr,
            interval,
            tx,
            refresh_rx,
        }
    }

    pub async fn run(mut self) {
        loop {
            match self.poll_once().await {
                PollOutcome::Continue => {}
                PollOutcome::Stop => return,
            }
            tokio::select! {
                () = time::sleep(time::Duration::from_secs(self.interval)) => {},
                changed = self.refresh_rx.changed() => {
                    if changed.is_err() {
                        return; // Sender dropped
                    }
                },
            }
        }
    }

    async fn poll_once(&self) -> PollOutcome {
        let result = fetch_checks(&*self.client, self.pr).await;
        let terminal = matches!(&result, Err(e) if e.is_terminal());
        if self.tx.send(AppEvent::ChecksFetched(result)).is_err() {
            tracing::warn!("poller: channel closed");
            return PollOutcome::Stop;
        }
        if terminal {
            PollOutcome::Stop
        } else {
            PollOutcome::Continue
        }
    }
}

enum PollOutcome {
    Continue,
    Stop,
}

/// Walks every page of the pull request's check contexts and aggregates
/// them into runs. A cursor that does not advance ends the walk.
pub async fn fetch_checks(client: &dyn HostClient, pr: u64) -> Result<ChecksSnapshot, FetchError> {
    let mut cursor: Option<String> = None;
    let mut info: Option<PullRequestInfo> = None;
    let mut contexts = Vec::new();
    let mut pages = 0usize;

    loop {
        let json = client.fetch_checks_page(pr, cursor.as_deref()).await?;
        let page = parser::parse_checks_page(&json)?;
        pages += 1;
        info.get_or_insert(page.pr);
        contexts.extend(page.contexts);

        if !page.page_info.has_next_page {
            break;
        }
        let Some(end_cursor) = page.page_info.end_cursor else {
            tracing::warn!(pages, "hasNextPage without endCursor; stopping");
            break;
        };
        if cursor.as_deref() == Some(end_cursor.as_str()) {
            tracing::warn!(pages, "page cursor did not advance; stopping");
            break;
        }
        cursor = Some(end_cursor);
    }

    tracing::debug!(pages, contexts = contexts.len(), "check contexts fetched");
    Ok(ChecksSnapshot {
        pr: info.unwrap_or_default(),
        runs: aggregate(contexts),
    })
}

fn send(tx: &mpsc::UnboundedSender<AppEvent>, label: &str, event: AppEvent) {
    if tx.send(event).is_err() {
        tracing::warn!("{label}: channel closed");
    }
}

pub async fn fetch_run_steps(client: &dyn HostClient, run_id: String, tx: &mpsc::UnboundedSender<AppEvent>) {
    let result = match client.fetch_run_steps(&run_id).await {
        Ok(json) => parser::parse_run_steps(&json),
        Err(e) => Err(e),
    };
    send(tx, "fetch_run_steps", AppEvent::RunStepsFetched { run_id, result });
}

pub async fn fetch_job_logs(client: &dyn HostClient, job_id: String, tx: &mpsc::UnboundedSender<AppEvent>) {
    let result = client.fetch_job_logs(&job_id).await;
    send(tx, "fetch_job_logs", AppEvent::JobLogsFetched { job_id, result });
}

pub async fn fetch_check_output(client: &dyn HostClient, job_id: String, tx: &mpsc::UnboundedSender<AppEvent>) {
    let result = match client.fetch_check_run_output(&job_id).await {
        Ok(json) => parser::parse_check_run_output(&json),
        Err(e) => Err(e),
    };
    send(tx, "fetch_check_output", AppEvent::CheckOutputFetched { job_id, result });
}

pub async fn rerun_job(
    client: &dyn HostClient,
    job_id: String,
    kind: JobKind,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let result = client.rerun_job(&job_id, kind).await;
    send(
        tx,
        "rerun_job",
        AppEvent::RerunFinished {
            target: RerunTarget::Job(job_id),
            result,
        },
    );
}

pub async fn rerun_run(
    client: &dyn HostClient,
    run_id: String,
    native: bool,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let result = client.rerun_run(&run_id, native).await;
    send(
        tx,
        "rerun_run",
        AppEvent::RerunFinished {
            target: RerunTarget::Run(run_id),
            result,
        },
    );
}
