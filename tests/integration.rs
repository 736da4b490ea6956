
use async_trait::async_trait;
use crossterm::event::KeyCode;
use fixtures::*;
use ghpr::app::{Bucket, JobKind, JobState, LogKind, Pane};
use ghpr::controller::Command;
use ghpr::error::FetchError;
use ghpr::events::{AppEvent, RerunTarget};
use ghpr::gh::{parser, poller};
use ghpr::logs;
use ghpr::traits::HostClient;
use ghpr::tui::logs_pane;
use pretty_assertions::assert_eq;
use std::sync::Mutex;

fn run_names(state: &ghpr::app::AppState) -> Vec<String> {
    state.runs.iter().map(|r| r.name.clone()).collect()
}

fn job_ids(state: &ghpr::app::AppState, run: usize) -> Vec<String> {
    state.runs[run].jobs.iter().map(|j| j.id.clone()).collect()
}

fn ci_nodes() -> Vec<serde_json::Value> {
    vec![
        native_check(2, "test", "CI", 100, 3, Some("SUCCESS")),
        native_check(1, "build", "CI", 100, 3, Some("FAILURE")),
        status_context("legacy/status"),
        external_check(5, "coverage", "Codecov", 700, "NEUTRAL"),
    ]
}

// ========== Data flow: JSON -> parser -> aggregate -> reducer ==========

#[test]
fn first_poll_builds_runs_and_requests_details() {
    let mut state = new_state(false);
    let cmds = state.apply(fetched(ci_nodes()));

    assert!(!state.is_loading);
    assert_eq!(state.pr.as_ref().map(|p| p.title.as_str()), Some("Add widget frobnicator"));
    assert_eq!(run_names(&state), vec!["CI", "Codecov"]);
    // failures sort first
    assert_eq!(job_ids(&state, 0), vec!["1", "2"]);
    assert_eq!(state.runs[0].id, "100");
    assert_eq!(state.runs[1].id, "700");
    assert_eq!(state.runs[1].jobs[0].kind, JobKind::ExternalCheck);
    assert_eq!(state.runs[1].jobs[0].bucket, Bucket::Skipping);
    assert_eq!(
        cmds,
        vec![
            Command::FetchRunSteps {
                run_id: "100".to_string()
            },
            Command::FetchJobLogs {
                job_id: "1".to_string()
            },
        ]
    );
}

#[test]
fn later_polls_append_jobs_and_workflows_without_reordering() {
    let mut state = new_state(false);
    state.apply(fetched(vec![
        native_check(1, "build", "CI", 100, 3, Some("FAILURE")),
        external_check(5, "coverage", "Codecov", 700, "NEUTRAL"),
    ]));

    state.apply(fetched(vec![
        native_check(20, "pages", "Docs", 200, 1, Some("SUCCESS")),
        native_check(2, "test", "CI", 100, 3, Some("SUCCESS")),
    ]));

    assert_eq!(run_names(&state), vec!["CI", "Codecov", "Docs"]);
    assert_eq!(job_ids(&state, 0), vec!["1", "2"]);
    assert_eq!(state.current_job().map(|j| j.id.as_str()), Some("1"));
    assert_eq!(state.job("20").map(|j| j.workflow.as_str()), Some("Docs"));
}

#[test]
fn stale_attempts_are_dropped_per_workflow() {
    let snap = snapshot(vec![
        native_check(10, "lint", "lint", 300, 1, Some("FAILURE")),
        native_check(11, "lint", "lint", 301, 2, Some("SUCCESS")),
        native_check(12, "fmt", "lint", 301, 2, Some("SUCCESS")),
        native_check(1, "build", "CI", 100, 1, Some("SUCCESS")),
    ]);
    assert_eq!(snap.runs.len(), 2);
    let lint: Vec<(&str, u64)> = snap.runs[0]
        .jobs
        .iter()
        .map(|j| (j.id.as_str(), j.run_number))
        .collect();
    assert_eq!(lint, vec![("12", 2), ("11", 2)]);
    // run number 1 in another workflow is not stale
    assert_eq!(snap.runs[1].jobs[0].id, "1");
}

#[test]
fn run_points_at_the_newest_attempt_even_when_listed_second() {
    let mut state = new_state(false);
    let cmds = state.apply(fetched(vec![
        native_check(10, "lint", "lint", 300, 1, Some("FAILURE")),
        native_check(11, "lint", "lint", 301, 2, Some("SUCCESS")),
    ]));

    let run = &state.runs[0];
    assert_eq!(job_ids(&state, 0), vec!["11"]);
    assert_eq!(run.id, "301");
    assert_eq!(run.run_number, 2);
    assert_eq!(run.link, "https://github.com/octo/widgets/actions/runs/301");
    assert_eq!(run.bucket, Bucket::Pass);
    assert_eq!(
        cmds[0],
        Command::FetchRunSteps {
            run_id: "301".to_string()
        }
    );

    // a later poll that still lists the old attempt first changes nothing
    state.apply(fetched(vec![
        native_check(10, "lint", "lint", 300, 1, Some("FAILURE")),
        native_check(11, "lint", "lint", 301, 2, Some("SUCCESS")),
    ]));
    assert_eq!(state.runs[0].id, "301");

    // a poll carrying only the stale attempt does not move the run back
    state.apply(fetched(vec![native_check(
        10, "lint", "lint", 300, 1, Some("FAILURE"),
    )]));
    assert_eq!(state.runs[0].id, "301");
    assert_eq!(job_ids(&state, 0), vec!["11"]);
}

#[test]
fn steps_logs_and_step_jump() {
    let mut state = new_state(false);
    state.apply(fetched(ci_nodes()));
    state.logs_viewport = (80, 3);

    let steps = parser::parse_run_steps(&run_jobs_json(
        1,
        &[("Set up job", "success"), ("Run tests", "failure"), ("Complete job", "success")],
    ));
    state.apply(AppEvent::RunStepsFetched {
        run_id: "100".to_string(),
        result: steps,
    });
    state.apply(AppEvent::JobLogsFetched {
        job_id: "1".to_string(),
        result: Ok(JOB_LOG.to_string()),
    });

    let job = state.current_job().unwrap();
    assert!(state.runs[0].steps_fetched);
    assert_eq!(job.steps.len(), 3);
    assert_eq!(job.logs.len(), 9);
    assert!(!job.loading_logs);

    state.apply(press(KeyCode::Tab));
    state.apply(press(KeyCode::Tab));
    assert_eq!(state.focus, Pane::Steps);
    state.apply(press(KeyCode::Down));
    assert_eq!(state.current_step().map(|s| s.name.as_str()), Some("Run tests"));
    assert_eq!(state.logs_scroll, 4);

    let lines = logs_pane::decorate(state.current_job().unwrap(), 80);
    assert_eq!(lines.len(), 9);
    let text: String = lines[6].spans.iter().map(|s| s.content.as_ref()).collect();
    assert_eq!(text, "  Process completed with exit code 101.");
}

#[test]
fn job_rerun_then_poll_reconciles_in_place() {
    let mut state = new_state(false);
    state.apply(fetched(ci_nodes()));

    state.apply(press(KeyCode::Tab));
    state.apply(press(KeyCode::Char('j')));
    assert_eq!(state.current_job().map(|j| j.id.as_str()), Some("2"));

    let cmds = state.apply(press(KeyCode::Char('R')));
    assert_eq!(
        cmds,
        vec![Command::RerunJob {
            job_id: "2".to_string(),
            kind: JobKind::NativeActions
        }]
    );
    let job = state.job("2").unwrap();
    assert_eq!(job.bucket, Bucket::Pending);
    assert_eq!(job.state, JobState::Pending);
    assert!(job.steps.is_empty() && job.logs.is_empty());
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_none());

    state.apply(AppEvent::RerunFinished {
        target: RerunTarget::Job("2".to_string()),
        result: Ok(()),
    });
    assert!(state.error_message().is_none());

    let cmds = state.apply(fetched(ci_nodes()));
    assert_eq!(run_names(&state), vec!["CI", "Codecov"]);
    assert_eq!(state.job("2").map(|j| j.bucket), Some(Bucket::Pass));
    assert_eq!(state.current_job().map(|j| j.id.as_str()), Some("2"));
    assert!(cmds.contains(&Command::FetchJobLogs {
        job_id: "2".to_string()
    }));
}

#[test]
fn flat_mode_walks_jobs_across_workflows() {
    let mut state = new_state(true);
    state.apply(fetched(ci_nodes()));
    assert_eq!(state.focus, Pane::Jobs);
    assert_eq!(state.visible_jobs().len(), 3);

    let cmds = state.apply(press(KeyCode::Char('G')));
    assert_eq!(state.selected_run, 1);
    assert_eq!(
        cmds,
        vec![Command::FetchCheckOutput {
            job_id: "5".to_string()
        }]
    );

    state.apply(AppEvent::CheckOutputFetched {
        job_id: "5".to_string(),
        result: Ok("## Coverage\n\nTotal: **87%**".to_string()),
    });
    state.logs_viewport = (60, 10);
    logs_pane::prepare(&mut state);
    let rendered = state.rendered_logs.get("5").unwrap();
    let first: String = rendered.lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
    assert_eq!(first, "Coverage");

    state.apply(press(KeyCode::Tab));
    state.apply(press(KeyCode::Tab));
    assert_eq!(state.focus, Pane::Logs);
    state.apply(press(KeyCode::Tab));
    assert_eq!(state.focus, Pane::Jobs);
}

// ========== Failure paths ==========

#[test]
fn missing_pull_request_is_fatal() {
    let json = r#"{"data":{"repository":{"pullRequest":null}},
                   "errors":[{"message":"Could not resolve to a PullRequest with the number of 999."}]}"#;
    let err = parser::parse_checks_page(json).unwrap_err();
    assert!(err.is_terminal());

    let mut state = new_state(false);
    let cmds = state.apply(AppEvent::ChecksFetched(Err(err)));
    assert_eq!(cmds, vec![Command::StopPolling]);
    assert!(state.fatal_error.as_deref().unwrap().contains("999"));

    // later results are ignored and only quitting works
    assert!(state.apply(fetched(ci_nodes())).is_empty());
    assert!(state.runs.is_empty());
    state.apply(press(KeyCode::Char('j')));
    assert!(!state.should_quit);
    state.apply(press(KeyCode::Char('q')));
    assert!(state.should_quit);
}

#[test]
fn zero_number_is_not_found() {
    let json = page_json(vec![], None).replace("\"number\":42", "\"number\":0");
    assert_eq!(
        parser::parse_checks_page(&json).unwrap_err(),
        FetchError::NotFound { number: 0 }
    );
}

#[test]
fn transport_failure_keeps_model_and_shows_toast() {
    let mut state = new_state(false);
    state.apply(fetched(ci_nodes()));
    let before = state.runs.clone();

    let cmds = state.apply(AppEvent::ChecksFetched(Err(FetchError::Transport(
        "gh command timed out after 30s".to_string(),
    ))));
    assert!(cmds.is_empty());
    assert_eq!(state.runs, before);
    assert!(state.fatal_error.is_none());
    assert_eq!(state.error_message(), Some("gh command timed out after 30s"));

    state.apply(press(KeyCode::Esc));
    assert!(state.error_message().is_none());
    assert!(!state.should_quit);
}

#[test]
fn log_failure_is_shown_in_place_of_the_log() {
    let mut state = new_state(false);
    state.apply(fetched(ci_nodes()));
    state.apply(AppEvent::JobLogsFetched {
        job_id: "1".to_string(),
        result: Err(FetchError::SubTransport {
            stderr: "HTTP 410: logs expired".to_string(),
        }),
    });
    let job = state.job("1").unwrap();
    assert_eq!(job.logs_error.as_deref(), Some("HTTP 410: logs expired"));
    assert!(!job.loading_logs);
    assert!(state.job("2").unwrap().logs_error.is_none());
}

// ========== Log parser ==========

#[test]
fn runner_log_classifies_every_marker() {
    let events = logs::parse(JOB_LOG);
    let kinds: Vec<LogKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LogKind::Plain,
            LogKind::GroupStart,
            LogKind::Plain,
            LogKind::GroupEnd,
            LogKind::StepStart,
            LogKind::Command,
            LogKind::Error,
            LogKind::GroupEnd,
            LogKind::CompleteJob,
        ]
    );
    let depths: Vec<usize> = events.iter().map(|e| e.depth).collect();
    assert_eq!(depths, vec![0, 1, 1, 0, 1, 1, 1, 0, 0]);
    assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn untimed_line_inherits_previous_timestamp() {
    let blob = "build\tstep\t2024-05-01T10:00:00Z first\nbuild\tstep\tsecond\n";
    let events = logs::parse(blob);
    assert_eq!(events.len(), 2);
    assert!(events[0].time.is_some());
    assert_eq!(events[1].time, events[0].time);
    assert_eq!(events[1].text, "second");
}

// ========== Pagination through the host client ==========

struct PagedClient {
    pages: Vec<String>,
    cursors: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl HostClient for PagedClient {
    async fn fetch_checks_page(&self, _pr: u64, cursor: Option<&str>) -> Result<String, FetchError> {
        let mut seen = self.cursors.lock().unwrap();
        seen.push(cursor.map(str::to_string));
        Ok(self.pages[seen.len() - 1].clone())
    }
    async fn fetch_run_steps(&self, _run_id: &str) -> Result<String, FetchError> {
        unreachable!()
    }
    async fn fetch_check_run_output(&self, _job_id: &str) -> Result<String, FetchError> {
        unreachable!()
    }
    async fn fetch_job_logs(&self, _job_id: &str) -> Result<String, FetchError> {
        unreachable!()
    }
    async fn rerun_job(&self, _job_id: &str, _kind: JobKind) -> Result<(), FetchError> {
        unreachable!()
    }
    async fn rerun_run(&self, _run_id: &str, _native: bool) -> Result<(), FetchError> {
        unreachable!()
    }
    fn open_in_browser(&self, _url: &str) -> Result<(), FetchError> {
        unreachable!()
    }
}

#[tokio::test]
async fn jobs_split_across_pages_land_in_one_run() {
    let client = PagedClient {
        pages: vec![
            page_json(vec![native_check(1, "build", "CI", 100, 3, Some("SUCCESS"))], Some("c1")),
            page_json(vec![native_check(2, "test", "CI", 100, 3, Some("FAILURE"))], None),
        ],
        cursors: Mutex::new(Vec::new()),
    };

    let snap = poller::fetch_checks(&client, PR).await.unwrap();
    assert_eq!(
        *client.cursors.lock().unwrap(),
        vec![None, Some("c1".to_string())]
    );
    assert_eq!(snap.runs.len(), 1);
    let ids: Vec<&str> = snap.runs[0].jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert_eq!(snap.pr.number, PR);
}
