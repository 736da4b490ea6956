//! Event reducer. Every model mutation happens in [`AppState::apply`]; the
//! work it asks for comes back as [`Command`] values that `main` executes off
//! the loop.

use crate::app::{AppState, JobKind, Pane};
use crate::error::FetchError;
use crate::events::{AppEvent, RerunTarget};
use crate::input::{self, Action, InputContext};
use crate::logs;
use crate::merge::merge_runs;
use chrono::Utc;
use std::time::Instant;

/// Rows moved by PageUp/PageDown in the list panes.
const LIST_PAGE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Wake the poller for an immediate fetch.
    Refresh,
    /// A terminal error is showing; stop background polling.
    StopPolling,
    FetchRunSteps { run_id: String },
    FetchJobLogs { job_id: String },
    FetchCheckOutput { job_id: String },
    RerunJob { job_id: String, kind: JobKind },
    RerunRun { run_id: String, native: bool },
    OpenUrl(String),
}

impl AppState {
    pub fn apply(&mut self, event: AppEvent) -> Vec<Command> {
        match event {
            AppEvent::Key(key) => {
                let ctx = InputContext {
                    has_error: self.error.is_some(),
                    is_loading: self.is_loading,
                    fatal: self.fatal_error.is_some(),
                };
                self.handle_action(input::map_key(key, &ctx))
            }
            AppEvent::Tick => {
                self.advance_spinner();
                self.prune_error();
                if let Some(last) = self.last_poll {
                    self.next_poll_in = self
                        .config
                        .poll_interval
                        .saturating_sub(last.elapsed().as_secs());
                }
                Vec::new()
            }
            AppEvent::Resize => {
                self.rendered_logs.clear();
                Vec::new()
            }
            _ if self.fatal_error.is_some() => Vec::new(),
            AppEvent::ChecksFetched(result) => self.on_checks_fetched(result),
            AppEvent::RunStepsFetched { run_id, result } => {
                self.on_run_steps(&run_id, result);
                Vec::new()
            }
            AppEvent::JobLogsFetched { job_id, result } => {
                self.on_job_logs(&job_id, result);
                Vec::new()
            }
            AppEvent::CheckOutputFetched { job_id, result } => {
                self.on_check_output(&job_id, result);
                Vec::new()
            }
            AppEvent::RerunFinished { target, result } => {
                match result {
                    Ok(()) => tracing::info!(?target, "re-run requested"),
                    Err(e) => {
                        tracing::warn!(?target, error = %e, "re-run failed");
                        let what = match target {
                            RerunTarget::Job(_) => "job",
                            RerunTarget::Run(_) => "run",
                        };
                        self.set_error(format!("Re-run {what} failed: {e}"));
                    }
                }
                Vec::new()
            }
            AppEvent::Error(msg) => {
                self.set_error(msg);
                Vec::new()
            }
        }
    }

    fn on_checks_fetched(&mut self, result: Result<crate::app::ChecksSnapshot, FetchError>) -> Vec<Command> {
        self.is_loading = false;
        self.last_poll = Some(Instant::now());
        self.next_poll_in = self.config.poll_interval;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_terminal() => {
                tracing::error!(error = %e, "checks fetch failed permanently");
                self.fatal_error = Some(e.to_string());
                return vec![Command::StopPolling];
            }
            Err(e) => {
                tracing::warn!(error = %e, "checks fetch failed");
                self.set_error(e.to_string());
                return Vec::new();
            }
        };

        tracing::info!(
            runs = snapshot.runs.len(),
            jobs = snapshot.runs.iter().map(|r| r.jobs.len()).sum::<usize>(),
            "checks fetched"
        );

        let selected = self.current_job().map(|j| j.id.clone());
        self.pr = Some(snapshot.pr);
        let previous = std::mem::take(&mut self.runs);
        self.runs = merge_runs(previous, snapshot.runs);
        self.rebuild_index();
        self.restore_selection(selected.as_deref());

        let runs = &self.runs;
        let index = &self.index;
        self.rendered_logs.retain(|id, _| {
            index
                .get(id)
                .and_then(|&(r, j)| runs.get(r)?.jobs.get(j))
                .is_some_and(|job| !job.logs.is_empty() || job.output.is_some() || job.logs_error.is_some())
        });
        self.clamp_logs_scroll();

        self.on_selection_changed()
    }

    fn on_run_steps(&mut self, run_id: &str, result: Result<Vec<crate::app::JobSteps>, FetchError>) {
        let Some(run) = self.run_by_id_mut(run_id) else {
            tracing::debug!(run_id, "steps for a run no longer shown");
            return;
        };
        run.loading_steps = false;
        match result {
            Ok(jobs) => {
                run.steps_fetched = true;
                for fetched in jobs {
                    let Some(job) = self.job_mut(&fetched.job_id) else {
                        continue;
                    };
                    job.steps = fetched.steps;
                    if job.link.is_empty() {
                        if let Some(link) = fetched.link {
                            job.link = link;
                        }
                    }
                }
                let steps = self.current_job().map_or(0, |j| j.steps.len());
                if self.selected_step >= steps {
                    self.selected_step = steps.saturating_sub(1);
                }
            }
            Err(e) => {
                tracing::warn!(run_id, error = %e, "steps fetch failed");
                self.set_error(format!("Failed to load steps: {e}"));
            }
        }
    }

    fn on_job_logs(&mut self, job_id: &str, result: Result<String, FetchError>) {
        let Some(job) = self.job_mut(job_id) else {
            tracing::debug!(job_id, "logs for a job no longer shown");
            return;
        };
        job.loading_logs = false;
        match result {
            Ok(blob) => {
                job.logs = logs::parse(&blob);
                job.logs_error = None;
                tracing::debug!(job_id, events = job.logs.len(), "job log parsed");
            }
            Err(FetchError::SubTransport { stderr }) => {
                tracing::warn!(job_id, %stderr, "log fetch failed");
                job.logs_error = Some(stderr);
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "log fetch failed");
                job.logs_error = Some(e.to_string());
            }
        }
        self.invalidate_rendered(job_id);
    }

    fn on_check_output(&mut self, job_id: &str, result: Result<String, FetchError>) {
        let Some(job) = self.job_mut(job_id) else {
            return;
        };
        job.loading_logs = false;
        match result {
            Ok(text) => {
                job.output = Some(text);
                job.logs_error = None;
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "check output fetch failed");
                job.logs_error = Some(e.to_string());
            }
        }
        self.invalidate_rendered(job_id);
    }

    fn handle_action(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Action::DismissError => {
                self.clear_error();
                Vec::new()
            }
            Action::MoveUp => self.move_selection(-1),
            Action::MoveDown => self.move_selection(1),
            Action::PageUp => {
                let page = self.page_size();
                self.move_selection(-(page as isize))
            }
            Action::PageDown => {
                let page = self.page_size();
                self.move_selection(page as isize)
            }
            Action::Top => self.move_selection(isize::MIN),
            Action::Bottom => self.move_selection(isize::MAX),
            Action::FocusNext => {
                self.focus = self.focus.next(self.config.opts.flat);
                Vec::new()
            }
            Action::FocusPrev => {
                self.focus = self.focus.prev(self.config.opts.flat);
                Vec::new()
            }
            Action::Refresh => {
                self.is_loading = true;
                vec![Command::Refresh]
            }
            Action::Rerun => self.rerun_selection(),
            Action::OpenBrowser => match self.current_url() {
                Some(url) => vec![Command::OpenUrl(url)],
                None => {
                    self.set_error("Nothing to open".to_string());
                    Vec::new()
                }
            },
            Action::None => Vec::new(),
        }
    }

    fn page_size(&self) -> usize {
        match self.focus {
            Pane::Logs => (self.logs_viewport.1 as usize).max(1),
            _ => LIST_PAGE,
        }
    }

    /// Moves the cursor of the focused pane by `delta`, clamped to its list.
    fn move_selection(&mut self, delta: isize) -> Vec<Command> {
        match self.focus {
            Pane::Runs => {
                let next = step_index(self.selected_run, delta, self.runs.len());
                if next == self.selected_run {
                    return Vec::new();
                }
                self.selected_run = next;
                self.selected_job = 0;
                self.reset_job_view();
                self.on_selection_changed()
            }
            Pane::Jobs => {
                let next = step_index(self.selected_job, delta, self.visible_jobs().len());
                if next == self.selected_job {
                    return Vec::new();
                }
                self.selected_job = next;
                if let Some((r, _)) = self.current_job_position() {
                    self.selected_run = r;
                }
                self.reset_job_view();
                self.on_selection_changed()
            }
            Pane::Steps => {
                let len = self.current_job().map_or(0, |j| j.steps.len());
                let next = step_index(self.selected_step, delta, len);
                if next != self.selected_step {
                    self.selected_step = next;
                    self.jump_to_step();
                }
                Vec::new()
            }
            Pane::Logs => {
                let max = self.max_logs_scroll();
                self.logs_scroll = step_index(self.logs_scroll, delta, max + 1);
                Vec::new()
            }
        }
    }

    fn reset_job_view(&mut self) {
        self.selected_step = 0;
        self.logs_scroll = 0;
    }

    fn clamp_logs_scroll(&mut self) {
        self.logs_scroll = self.logs_scroll.min(self.max_logs_scroll());
    }

    /// Scrolls the log to the start of the selected step, when the log has one.
    fn jump_to_step(&mut self) {
        let offset = self.current_step().and_then(|step| {
            self.current_job()
                .and_then(|job| job.step_log_offset(&step.name))
        });
        if let Some(offset) = offset {
            self.logs_scroll = offset.min(self.max_logs_scroll());
        }
    }

    /// Lazy fetches for whatever is selected now: the run's steps once, and
    /// the job's log or check output on its first selection.
    pub fn on_selection_changed(&mut self) -> Vec<Command> {
        let mut cmds = Vec::new();

        let run_idx = self
            .current_job_position()
            .map_or(self.selected_run, |(r, _)| r);
        if let Some(run) = self.runs.get_mut(run_idx) {
            if !run.steps_fetched && !run.loading_steps && !run.id.is_empty() && run.has_native_jobs() {
                run.loading_steps = true;
                tracing::debug!(run_id = %run.id, "fetching run steps");
                cmds.push(Command::FetchRunSteps {
                    run_id: run.id.clone(),
                });
            }
        }

        if let Some(job) = self.current_job_mut() {
            if !job.initiated_logs_fetch && !job.id.is_empty() && !job.state.is_active() {
                job.initiated_logs_fetch = true;
                job.loading_logs = true;
                let job_id = job.id.clone();
                tracing::debug!(%job_id, output = job.wants_check_output(), "fetching job details");
                if job.wants_check_output() {
                    cmds.push(Command::FetchCheckOutput { job_id });
                } else {
                    cmds.push(Command::FetchJobLogs { job_id });
                }
            }
        }

        cmds
    }

    /// Optimistically resets the selected run (runs pane) or job (elsewhere)
    /// and asks the host to run it again. The next poll reconciles.
    fn rerun_selection(&mut self) -> Vec<Command> {
        let now = Utc::now();
        if self.focus == Pane::Runs && !self.config.opts.flat {
            let Some(run) = self.runs.get_mut(self.selected_run) else {
                return Vec::new();
            };
            if run.id.is_empty() {
                self.set_error("Cannot re-run: run has no id".to_string());
                return Vec::new();
            }
            let native = run.has_native_jobs();
            let run_id = run.id.clone();
            run.reset_for_rerun(now);
            let job_ids: Vec<String> = run.jobs.iter().map(|j| j.id.clone()).collect();
            for id in &job_ids {
                self.invalidate_rendered(id);
            }
            self.reset_job_view();
            return vec![Command::RerunRun { run_id, native }];
        }

        let Some((r, _)) = self.current_job_position() else {
            return Vec::new();
        };
        let Some(job) = self.current_job_mut() else {
            return Vec::new();
        };
        if job.id.is_empty() {
            self.set_error("Cannot re-run: job has no id".to_string());
            return Vec::new();
        }
        if job.state.is_active() {
            self.set_error("Cannot re-run: job is still in progress".to_string());
            return Vec::new();
        }
        let job_id = job.id.clone();
        let kind = job.kind;
        job.reset_for_rerun(now);
        if let Some(run) = self.runs.get_mut(r) {
            run.steps_fetched = false;
        }
        self.invalidate_rendered(&job_id);
        self.reset_job_view();
        vec![Command::RerunJob { job_id, kind }]
    }
}

/// `current + delta` clamped to `0..len`. Saturates at both ends.
fn step_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let moved = if delta < 0 {
        current.saturating_sub(delta.unsigned_abs())
    } else {
        current.saturating_add(delta.unsigned_abs())
    };
    moved.min(len - 1)
}
