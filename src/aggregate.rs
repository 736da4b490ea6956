//! Groups the flat check-context list into one [`WorkflowRun`] per workflow.
//!
//! Grouping is by derived workflow name rather than run id: the host returns
//! several runs per workflow across attempts and re-runs, and the UI shows one
//! row per workflow. Stale attempts are then dropped by [`dedup_attempts`].

use crate::app::{Bucket, JobKind, JobState, WorkflowJob, WorkflowRun};
use crate::gh::parser::CheckContext;
use std::collections::HashMap;

/// Authoring app name of the host's first-party CI.
pub const NATIVE_APP_NAME: &str = "GitHub Actions";
/// Details links under this domain belong to the host.
pub const PRIMARY_HOST: &str = "github.com";

const CHECK_RUN_TYPENAME: &str = "CheckRun";

pub fn aggregate(contexts: Vec<CheckContext>) -> Vec<WorkflowRun> {
    let mut runs: Vec<WorkflowRun> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for check in contexts {
        if check.typename != CHECK_RUN_TYPENAME {
            continue;
        }
        let name = workflow_name(&check);
        let job = build_job(&check, &name);
        match by_name.get(&name) {
            Some(&idx) => {
                let run = &mut runs[idx];
                // The header follows the newest attempt, which dedup keeps.
                if job.run_number > run.run_number {
                    let newer = build_run(&check, &name);
                    run.adopt_header(newer);
                }
                run.jobs.push(job);
            }
            None => {
                let mut run = build_run(&check, &name);
                run.jobs.push(job);
                by_name.insert(name, runs.len());
                runs.push(run);
            }
        }
    }

    for run in &mut runs {
        dedup_attempts(&mut run.jobs);
        sort_jobs(&mut run.jobs);
    }
    runs
}

fn is_native(check: &CheckContext) -> bool {
    app_name(check) == NATIVE_APP_NAME
}

fn app_name(check: &CheckContext) -> &str {
    check
        .check_suite
        .as_ref()
        .and_then(|s| s.app.as_ref())
        .map_or("", |a| a.name.as_str())
}

/// Embedded workflow name for native checks, else the authoring app's
/// name, else the check's own name.
pub fn workflow_name(check: &CheckContext) -> String {
    let suite = check.check_suite.as_ref();
    let derived = if is_native(check) {
        suite
            .and_then(|s| s.workflow_run.as_ref())
            .and_then(|r| r.workflow.as_ref())
            .map_or("", |w| w.name.as_str())
    } else {
        app_name(check)
    };
    if derived.is_empty() {
        check.name.clone().unwrap_or_default()
    } else {
        derived.to_string()
    }
}

fn check_link(check: &CheckContext) -> String {
    check
        .details_url
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| check.url.clone())
        .unwrap_or_default()
}

fn build_run(check: &CheckContext, name: &str) -> WorkflowRun {
    let suite = check.check_suite.as_ref();
    let wf_run = suite.and_then(|s| s.workflow_run.as_ref());

    let link = wf_run
        .and_then(|r| r.url.clone())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| check_link(check));
    let id = wf_run
        .and_then(|r| r.database_id)
        .or_else(|| suite.and_then(|s| s.database_id));
    if id.is_none() {
        tracing::warn!(workflow = name, "check suite has no run id");
    }

    WorkflowRun {
        id: id.map(|id| id.to_string()).unwrap_or_default(),
        name: name.to_string(),
        link,
        event: wf_run.and_then(|r| r.event.clone()).unwrap_or_default(),
        run_number: wf_run.and_then(|r| r.run_number).unwrap_or(0),
        bucket: Bucket::from_conclusion(
            suite.and_then(|s| s.conclusion.as_deref()).unwrap_or_default(),
        ),
        jobs: Vec::new(),
        steps_fetched: false,
        loading_steps: false,
    }
}

/// `NativeActions` for the first-party app, `ExternalCheck` when the details
/// link leaves the host, otherwise `GenericCheckRun`.
pub fn job_kind(check: &CheckContext) -> JobKind {
    if is_native(check) {
        return JobKind::NativeActions;
    }
    let link = check.details_url.as_deref().unwrap_or_default();
    let host = url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
    match host {
        Some(h) if h == PRIMARY_HOST || h.ends_with(&format!(".{PRIMARY_HOST}")) => {
            JobKind::GenericCheckRun
        }
        Some(_) => JobKind::ExternalCheck,
        None => JobKind::GenericCheckRun,
    }
}

fn build_job(check: &CheckContext, workflow: &str) -> WorkflowJob {
    let wf_run = check
        .check_suite
        .as_ref()
        .and_then(|s| s.workflow_run.as_ref());
    let pending_env = wf_run
        .and_then(|r| r.pending_deployment_requests.as_ref())
        .and_then(|p| p.nodes.iter().flatten().next())
        .and_then(|d| d.environment.as_ref())
        .and_then(|e| e.name.clone())
        .filter(|n| !n.is_empty());
    let conclusion = check.conclusion.clone().unwrap_or_default();

    WorkflowJob {
        id: check.database_id.map(|id| id.to_string()).unwrap_or_default(),
        state: JobState::parse(check.status.as_deref().unwrap_or_default()),
        bucket: Bucket::from_conclusion(&conclusion),
        conclusion,
        name: check.name.clone().unwrap_or_default(),
        workflow: workflow.to_string(),
        run_number: wf_run.and_then(|r| r.run_number).unwrap_or(0),
        event: wf_run.and_then(|r| r.event.clone()).unwrap_or_default(),
        link: check_link(check),
        started_at: check.started_at,
        completed_at: check.completed_at,
        kind: job_kind(check),
        pending_env,
        title: check.title.clone().filter(|t| !t.is_empty()),
        steps: Vec::new(),
        logs: Vec::new(),
        output: None,
        initiated_logs_fetch: false,
        loading_logs: false,
        logs_error: None,
    }
}

/// Keeps, per workflow name, only the jobs of the highest run number seen.
/// Idempotent and order-preserving.
pub fn dedup_attempts(jobs: &mut Vec<WorkflowJob>) {
    let mut latest: HashMap<&str, u64> = HashMap::new();
    for job in jobs.iter() {
        let max = latest.entry(job.workflow.as_str()).or_insert(0);
        *max = (*max).max(job.run_number);
    }
    let latest: HashMap<String, u64> = latest
        .into_iter()
        .map(|(name, n)| (name.to_string(), n))
        .collect();
    jobs.retain(|job| latest.get(&job.workflow).copied().unwrap_or(0) == job.run_number);
}

/// Stable sort: bucket (fails first), then case-insensitive name.
pub fn sort_jobs(jobs: &mut [WorkflowJob]) {
    jobs.sort_by_cached_key(|job| (job.bucket, job.name.to_lowercase()));
}
