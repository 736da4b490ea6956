use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;

use crate::tui::logs_pane::RenderedLogs;

// Polling
pub const POLL_INTERVAL_SECS: u64 = 10;

// UI constants
pub const SPINNER_FRAME_COUNT: usize = 10;
pub const NARROW_WIDTH_THRESHOLD: u16 = 100;
pub const ERROR_TTL_SECS: u64 = 10;

/// Coarse five-valued conclusion used throughout the UI.
///
/// Declaration order is the in-run sort order: failures first so the
/// actionable items surface at the top of the jobs pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Fail,
    Pending,
    Cancel,
    Skipping,
    Pass,
}

impl Bucket {
    /// Maps a host conclusion string (any case) onto its bucket. Total: every
    /// unknown or empty value is `Pending`.
    pub fn from_conclusion(conclusion: &str) -> Self {
        match conclusion.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Bucket::Pass,
            "SKIPPED" | "NEUTRAL" => Bucket::Skipping,
            "ERROR" | "FAILURE" | "TIMED_OUT" | "ACTION_REQUIRED" => Bucket::Fail,
            "CANCELLED" => Bucket::Cancel,
            _ => Bucket::Pending,
        }
    }
}

/// Lifecycle state of a job or step as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Completed,
    InProgress,
    Queued,
    Requested,
    Waiting,
    Pending,
    Unknown,
}

impl JobState {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => JobState::Completed,
            "IN_PROGRESS" => JobState::InProgress,
            "QUEUED" => JobState::Queued,
            "REQUESTED" => JobState::Requested,
            "WAITING" => JobState::Waiting,
            "PENDING" => JobState::Pending,
            _ => JobState::Unknown,
        }
    }

    /// Not yet finished; such jobs have no complete log to fetch.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobState::InProgress
                | JobState::Queued
                | JobState::Requested
                | JobState::Waiting
                | JobState::Pending
        )
    }
}

/// Who produced a check, which decides how its details are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Authored by the host's first-party actions app: raw logs are available.
    NativeActions,
    /// Details link points off the host (third-party CI).
    ExternalCheck,
    /// Any other check run; only its "output" payload is available.
    GenericCheckRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub number: u64,
    pub name: String,
    pub status: JobState,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn bucket(&self) -> Bucket {
        Bucket::from_conclusion(&self.conclusion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Plain,
    StepStart,
    GroupStart,
    GroupEnd,
    Command,
    Error,
    JobCleanup,
    CompleteJob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// `None` is the zero timestamp: no line before this one carried a time.
    pub time: Option<DateTime<Utc>>,
    pub depth: usize,
    pub kind: LogKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowJob {
    pub id: String,
    pub state: JobState,
    pub conclusion: String,
    pub name: String,
    pub workflow: String,
    pub run_number: u64,
    pub event: String,
    pub link: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub bucket: Bucket,
    pub kind: JobKind,
    pub pending_env: Option<String>,
    pub title: Option<String>,

    // Lazily populated
    pub steps: Vec<Step>,
    pub logs: Vec<LogEvent>,
    /// Concatenated check-run output (markdown) for non-native checks.
    pub output: Option<String>,
    pub initiated_logs_fetch: bool,
    pub loading_logs: bool,
    pub logs_error: Option<String>,
}

impl WorkflowJob {
    /// Non-native checks, and anything carrying a title, show the check-run
    /// output payload instead of a raw log.
    pub fn wants_check_output(&self) -> bool {
        self.kind != JobKind::NativeActions || self.title.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn reset_for_rerun(&mut self, now: DateTime<Utc>) {
        self.bucket = Bucket::Pending;
        self.state = JobState::Pending;
        self.conclusion.clear();
        self.started_at = Some(now);
        self.completed_at = None;
        self.steps.clear();
        self.logs.clear();
        self.output = None;
        self.initiated_logs_fetch = false;
        self.loading_logs = false;
        self.logs_error = None;
    }

    /// Carries lazily fetched state over from the copy this job replaces.
    /// A job whose bucket moved has new logs, so nothing is inherited then.
    pub fn inherit_lazy_state(&mut self, old: &WorkflowJob) {
        if old.bucket != self.bucket {
            return;
        }
        if self.steps.is_empty() {
            self.steps.clone_from(&old.steps);
        }
        self.logs.clone_from(&old.logs);
        self.output.clone_from(&old.output);
        self.initiated_logs_fetch = old.initiated_logs_fetch;
        self.loading_logs = old.loading_logs;
        self.logs_error.clone_from(&old.logs_error);
    }

    /// Index of the step-start log event for `step_name`, if the log has one.
    pub fn step_log_offset(&self, step_name: &str) -> Option<usize> {
        self.logs
            .iter()
            .position(|e| e.kind == LogKind::StepStart && e.text.contains(step_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    /// Workflow-run database id, or the check-suite id for non-native checks.
    pub id: String,
    /// Grouping key: workflow name, app name, or check name.
    pub name: String,
    pub link: String,
    pub event: String,
    pub run_number: u64,
    pub bucket: Bucket,
    pub jobs: Vec<WorkflowJob>,
    pub steps_fetched: bool,
    pub loading_steps: bool,
}

impl WorkflowRun {
    pub fn has_native_jobs(&self) -> bool {
        self.jobs.iter().any(|j| j.kind == JobKind::NativeActions)
    }

    /// Takes the attempt-specific fields of `other`; name, jobs and lazy
    /// flags stay.
    pub fn adopt_header(&mut self, other: WorkflowRun) {
        self.id = other.id;
        self.link = other.link;
        self.event = other.event;
        self.run_number = other.run_number;
        self.bucket = other.bucket;
    }

    pub fn reset_for_rerun(&mut self, now: DateTime<Utc>) {
        self.bucket = Bucket::Pending;
        self.steps_fetched = false;
        self.loading_steps = false;
        for job in &mut self.jobs {
            job.reset_for_rerun(now);
        }
    }
}

/// Steps fetched for one job of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSteps {
    pub job_id: String,
    pub link: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub url: String,
}

/// One logical fetch of every check attached to the pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksSnapshot {
    pub pr: PullRequestInfo,
    pub runs: Vec<WorkflowRun>,
}

/// Construction-time options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelOpts {
    /// List every job of every workflow in the jobs pane (runs pane hidden).
    pub flat: bool,
}

/// Immutable configuration set at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub repo: String,
    pub pr_number: u64,
    pub poll_interval: u64,
    pub opts: ModelOpts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Runs,
    Jobs,
    Steps,
    Logs,
}

impl Pane {
    pub fn next(self, flat: bool) -> Self {
        match self {
            Pane::Runs => Pane::Jobs,
            Pane::Jobs => Pane::Steps,
            Pane::Steps => Pane::Logs,
            Pane::Logs if flat => Pane::Jobs,
            Pane::Logs => Pane::Runs,
        }
    }

    pub fn prev(self, flat: bool) -> Self {
        match self {
            Pane::Runs | Pane::Jobs if flat => Pane::Logs,
            Pane::Runs => Pane::Logs,
            Pane::Jobs => Pane::Runs,
            Pane::Steps => Pane::Jobs,
            Pane::Logs => Pane::Steps,
        }
    }
}

pub struct AppState {
    pub config: AppConfig,

    // Model
    pub pr: Option<PullRequestInfo>,
    pub runs: Vec<WorkflowRun>,
    /// job id -> (run index, job index); rebuilt after every merge.
    pub index: HashMap<String, (usize, usize)>,

    // Selection
    pub focus: Pane,
    pub selected_run: usize,
    /// Index into `visible_jobs()`.
    pub selected_job: usize,
    pub selected_step: usize,
    pub logs_scroll: usize,
    /// Inner size of the logs pane, updated by the draw loop.
    pub logs_viewport: (u16, u16),

    // Polling
    pub is_loading: bool,
    pub last_poll: Option<Instant>,
    pub next_poll_in: u64,

    // Transient UI
    pub error: Option<(String, Instant)>,
    pub fatal_error: Option<String>,
    pub spinner_frame: usize,
    pub should_quit: bool,

    /// Decorated log lines per job id, memoised on first display.
    pub rendered_logs: HashMap<String, RenderedLogs>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let focus = if config.opts.flat { Pane::Jobs } else { Pane::Runs };
        Self {
            config,
            pr: None,
            runs: Vec::new(),
            index: HashMap::new(),
            focus,
            selected_run: 0,
            selected_job: 0,
            selected_step: 0,
            logs_scroll: 0,
            logs_viewport: (0, 0),
            is_loading: true,
            last_poll: None,
            next_poll_in: 0,
            error: None,
            fatal_error: None,
            spinner_frame: 0,
            should_quit: false,
            rendered_logs: HashMap::new(),
        }
    }

    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (run_idx, run) in self.runs.iter().enumerate() {
            for (job_idx, job) in run.jobs.iter().enumerate() {
                if job.id.is_empty() {
                    continue;
                }
                self.index.insert(job.id.clone(), (run_idx, job_idx));
            }
        }
    }

    pub fn job(&self, id: &str) -> Option<&WorkflowJob> {
        let &(r, j) = self.index.get(id)?;
        self.runs.get(r)?.jobs.get(j)
    }

    pub fn job_mut(&mut self, id: &str) -> Option<&mut WorkflowJob> {
        let &(r, j) = self.index.get(id)?;
        self.runs.get_mut(r)?.jobs.get_mut(j)
    }

    pub fn run_by_id_mut(&mut self, id: &str) -> Option<&mut WorkflowRun> {
        self.runs.iter_mut().find(|r| r.id == id)
    }

    /// Positions of the jobs listed in the jobs pane.
    pub fn visible_jobs(&self) -> Vec<(usize, usize)> {
        if self.config.opts.flat {
            self.runs
                .iter()
                .enumerate()
                .flat_map(|(r, run)| (0..run.jobs.len()).map(move |j| (r, j)))
                .collect()
        } else {
            self.runs
                .get(self.selected_run)
                .map(|run| (0..run.jobs.len()).map(|j| (self.selected_run, j)).collect())
                .unwrap_or_default()
        }
    }

    pub fn current_run(&self) -> Option<&WorkflowRun> {
        self.runs.get(self.selected_run)
    }

    pub fn current_job_position(&self) -> Option<(usize, usize)> {
        self.visible_jobs().get(self.selected_job).copied()
    }

    pub fn current_job(&self) -> Option<&WorkflowJob> {
        let (r, j) = self.current_job_position()?;
        self.runs.get(r)?.jobs.get(j)
    }

    pub fn current_job_mut(&mut self) -> Option<&mut WorkflowJob> {
        let (r, j) = self.current_job_position()?;
        self.runs.get_mut(r)?.jobs.get_mut(j)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.current_job()?.steps.get(self.selected_step)
    }

    /// Re-points the job cursor at `job_id` after the lists were rebuilt,
    /// clamping when the job is gone.
    pub fn restore_selection(&mut self, job_id: Option<&str>) {
        if self.selected_run >= self.runs.len() {
            self.selected_run = self.runs.len().saturating_sub(1);
        }
        let visible = self.visible_jobs();
        let found = job_id.and_then(|id| {
            visible
                .iter()
                .position(|&(r, j)| self.runs[r].jobs[j].id == id)
        });
        match found {
            Some(pos) => self.selected_job = pos,
            None => {
                if self.selected_job >= visible.len() {
                    self.selected_job = visible.len().saturating_sub(1);
                }
            }
        }
        if let Some(&(r, _)) = visible.get(self.selected_job) {
            if self.config.opts.flat {
                self.selected_run = r;
            }
        }
        let steps = self.current_job().map_or(0, |j| j.steps.len());
        if self.selected_step >= steps {
            self.selected_step = steps.saturating_sub(1);
        }
    }

    /// Number of lines the logs pane currently has to show.
    pub fn current_log_len(&self) -> usize {
        let Some(job) = self.current_job() else {
            return 0;
        };
        match self.rendered_logs.get(&job.id) {
            Some(rendered) => rendered.lines.len(),
            None => job.logs.len(),
        }
    }

    pub fn max_logs_scroll(&self) -> usize {
        self.current_log_len()
            .saturating_sub(self.logs_viewport.1 as usize)
    }

    pub fn invalidate_rendered(&mut self, job_id: &str) {
        self.rendered_logs.remove(job_id);
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some((msg, Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }

    /// Most specific link for the current selection: job, then run, then PR.
    pub fn current_url(&self) -> Option<String> {
        let job_link = match self.focus {
            Pane::Runs => None,
            _ => self.current_job().map(|j| j.link.clone()),
        };
        job_link
            .filter(|l| !l.is_empty())
            .or_else(|| self.current_run().map(|r| r.link.clone()))
            .filter(|l| !l.is_empty())
            .or_else(|| self.pr.as_ref().map(|p| p.url.clone()))
            .filter(|l| !l.is_empty())
    }
}
