use crate::aggregate::{dedup_attempts, sort_jobs};
use crate::app::WorkflowRun;
use std::collections::HashSet;

/// Folds a freshly fetched run list into the one already on screen.
///
/// Existing rows keep their position; workflow names seen for the first time
/// are appended in the order they appear in `fresh`. Rows present in both
/// take their jobs from both, then stale attempts are dropped and the jobs
/// re-sorted.
pub fn merge_runs(previous: Vec<WorkflowRun>, fresh: Vec<WorkflowRun>) -> Vec<WorkflowRun> {
    let mut merged = previous;
    for run in fresh {
        match merged.iter_mut().find(|r| r.name == run.name) {
            Some(existing) => absorb(existing, run),
            None => merged.push(run),
        }
    }
    merged
}

fn job_ids(run: &WorkflowRun) -> HashSet<String> {
    run.jobs.iter().map(|j| j.id.clone()).collect()
}

fn absorb(existing: &mut WorkflowRun, mut fresh: WorkflowRun) {
    let old_id = existing.id.clone();
    let old_jobs = job_ids(existing);

    let fresh_jobs = std::mem::take(&mut fresh.jobs);
    // An older attempt in the fetch loses to the jobs already shown.
    if fresh.run_number >= existing.run_number {
        existing.adopt_header(fresh);
    }

    for mut job in fresh_jobs {
        let same = existing
            .jobs
            .iter_mut()
            .find(|j| !job.id.is_empty() && j.id == job.id);
        match same {
            Some(slot) => {
                job.inherit_lazy_state(slot);
                *slot = job;
            }
            None => existing.jobs.push(job),
        }
    }

    dedup_attempts(&mut existing.jobs);
    sort_jobs(&mut existing.jobs);

    if existing.id != old_id || job_ids(existing) != old_jobs {
        existing.steps_fetched = false;
        if existing.id != old_id {
            existing.loading_steps = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Bucket, JobKind, JobState, LogEvent, LogKind, Step, WorkflowJob};
    use pretty_assertions::assert_eq;

    fn job(id: &str, name: &str, run_number: u64, bucket: Bucket) -> WorkflowJob {
        WorkflowJob {
            id: id.to_string(),
            state: JobState::Completed,
            conclusion: String::new(),
            name: name.to_string(),
            workflow: "W".to_string(),
            run_number,
            event: "pull_request".to_string(),
            link: String::new(),
            started_at: None,
            completed_at: None,
            bucket,
            kind: JobKind::NativeActions,
            pending_env: None,
            title: None,
            steps: Vec::new(),
            logs: Vec::new(),
            output: None,
            initiated_logs_fetch: false,
            loading_logs: false,
            logs_error: None,
        }
    }

    fn run(id: &str, name: &str, jobs: Vec<WorkflowJob>) -> WorkflowRun {
        WorkflowRun {
            id: id.to_string(),
            name: name.to_string(),
            link: format!("https://github.com/o/r/actions/runs/{id}"),
            event: "pull_request".to_string(),
            run_number: jobs.first().map_or(0, |j| j.run_number),
            bucket: Bucket::Pass,
            jobs,
            steps_fetched: false,
            loading_steps: false,
        }
    }

    fn names(runs: &[WorkflowRun]) -> Vec<&str> {
        runs.iter().map(|r| r.name.as_str()).collect()
    }

    fn job_names(run: &WorkflowRun) -> Vec<&str> {
        run.jobs.iter().map(|j| j.name.as_str()).collect()
    }

    #[test]
    fn same_workflow_new_job_is_appended() {
        let prev = vec![run("1", "W", vec![job("11", "J1", 1, Bucket::Pass)])];
        let fresh = vec![run("1", "W", vec![job("12", "J2", 1, Bucket::Pass)])];
        let merged = merge_runs(prev, fresh);
        assert_eq!(merged.len(), 1);
        assert_eq!(job_names(&merged[0]), vec!["J1", "J2"]);
    }

    #[test]
    fn new_workflow_is_appended_last() {
        let prev = vec![run("1", "A", vec![job("11", "a", 1, Bucket::Pass)])];
        let fresh = vec![run("2", "B", vec![job("21", "b", 1, Bucket::Pass)])];
        assert_eq!(names(&merge_runs(prev, fresh)), vec!["A", "B"]);
    }

    #[test]
    fn previous_order_is_a_prefix() {
        let prev = vec![
            run("1", "C", vec![job("11", "c", 1, Bucket::Pass)]),
            run("2", "A", vec![job("21", "a", 1, Bucket::Pass)]),
        ];
        let fresh = vec![
            run("3", "B", vec![job("31", "b", 1, Bucket::Pass)]),
            run("2", "A", vec![job("21", "a", 1, Bucket::Fail)]),
            run("4", "D", vec![job("41", "d", 1, Bucket::Pass)]),
            run("1", "C", vec![job("11", "c", 1, Bucket::Pass)]),
        ];
        assert_eq!(names(&merge_runs(prev, fresh)), vec!["C", "A", "B", "D"]);
    }

    #[test]
    fn empty_fresh_keeps_previous() {
        let prev = vec![run("1", "A", vec![job("11", "a", 1, Bucket::Pass)])];
        assert_eq!(merge_runs(prev.clone(), Vec::new()), prev);
    }

    #[test]
    fn fresh_fields_win_except_name() {
        let prev = vec![run("1", "W", vec![job("11", "J1", 1, Bucket::Pending)])];
        let mut newer = run("9", "W", vec![job("91", "J1", 2, Bucket::Fail)]);
        newer.link = "https://github.com/o/r/actions/runs/9".to_string();
        newer.event = "push".to_string();
        newer.bucket = Bucket::Fail;
        let merged = merge_runs(prev, vec![newer]);
        let r = &merged[0];
        assert_eq!(r.name, "W");
        assert_eq!(r.id, "9");
        assert_eq!(r.link, "https://github.com/o/r/actions/runs/9");
        assert_eq!(r.event, "push");
        assert_eq!(r.bucket, Bucket::Fail);
    }

    #[test]
    fn older_attempt_in_fetch_keeps_current_header() {
        let prev = vec![run("2", "W", vec![job("21", "build", 2, Bucket::Pass)])];
        let mut stale = run("1", "W", vec![job("11", "build", 1, Bucket::Fail)]);
        stale.bucket = Bucket::Fail;
        let merged = merge_runs(prev.clone(), vec![stale]);
        assert_eq!(merged, prev);
    }

    #[test]
    fn newer_attempt_replaces_older_jobs() {
        let prev = vec![run(
            "1",
            "W",
            vec![job("11", "build", 1, Bucket::Fail), job("12", "test", 1, Bucket::Pass)],
        )];
        let fresh = vec![run("2", "W", vec![job("21", "build", 2, Bucket::Pending)])];
        let merged = merge_runs(prev, fresh);
        let ids: Vec<&str> = merged[0].jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["21"]);
    }

    #[test]
    fn same_id_is_replaced_not_duplicated() {
        let prev = vec![run("1", "W", vec![job("11", "build", 1, Bucket::Pending)])];
        let mut updated = job("11", "build", 1, Bucket::Pass);
        updated.state = JobState::Completed;
        let merged = merge_runs(prev, vec![run("1", "W", vec![updated])]);
        assert_eq!(merged[0].jobs.len(), 1);
        assert_eq!(merged[0].jobs[0].bucket, Bucket::Pass);
    }

    #[test]
    fn lazy_state_survives_when_bucket_unchanged() {
        let mut old = job("11", "build", 1, Bucket::Pass);
        old.steps.push(Step {
            number: 1,
            name: "Set up job".to_string(),
            status: JobState::Completed,
            conclusion: "success".to_string(),
            started_at: None,
            completed_at: None,
        });
        old.logs.push(LogEvent {
            time: None,
            depth: 0,
            kind: LogKind::Plain,
            text: "hello".to_string(),
        });
        old.initiated_logs_fetch = true;
        let mut prev = vec![run("1", "W", vec![old])];
        prev[0].steps_fetched = true;

        let merged = merge_runs(prev, vec![run("1", "W", vec![job("11", "build", 1, Bucket::Pass)])]);
        let j = &merged[0].jobs[0];
        assert_eq!(j.steps.len(), 1);
        assert_eq!(j.logs.len(), 1);
        assert!(j.initiated_logs_fetch);
        assert!(merged[0].steps_fetched);
    }

    #[test]
    fn lazy_state_dropped_when_bucket_moved() {
        let mut old = job("11", "build", 1, Bucket::Pending);
        old.initiated_logs_fetch = true;
        old.output = Some("partial".to_string());
        let merged = merge_runs(
            vec![run("1", "W", vec![old])],
            vec![run("1", "W", vec![job("11", "build", 1, Bucket::Fail)])],
        );
        let j = &merged[0].jobs[0];
        assert!(!j.initiated_logs_fetch);
        assert!(j.output.is_none());
    }

    #[test]
    fn steps_refetched_when_job_set_changes() {
        let mut prev = vec![run("1", "W", vec![job("11", "a", 1, Bucket::Pass)])];
        prev[0].steps_fetched = true;
        let merged = merge_runs(prev, vec![run("1", "W", vec![job("12", "b", 1, Bucket::Pass)])]);
        assert!(!merged[0].steps_fetched);
    }

    #[test]
    fn jobs_are_resorted_after_merge() {
        let prev = vec![run("1", "W", vec![job("11", "alpha", 1, Bucket::Pass)])];
        let fresh = vec![run("1", "W", vec![job("12", "zulu", 1, Bucket::Fail)])];
        let merged = merge_runs(prev, fresh);
        assert_eq!(job_names(&merged[0]), vec!["zulu", "alpha"]);
    }

    #[test]
    fn merge_is_idempotent_for_identical_fetch() {
        let fresh = vec![
            run("1", "A", vec![job("11", "a", 1, Bucket::Pass)]),
            run("2", "B", vec![job("21", "b", 1, Bucket::Fail)]),
        ];
        let once = merge_runs(Vec::new(), fresh.clone());
        let twice = merge_runs(once.clone(), fresh);
        assert_eq!(once, twice);
    }
}
