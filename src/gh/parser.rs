use crate::app::{JobSteps, JobState, PullRequestInfo, Step};
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10 MB

fn check_response_size(json: &str) -> Result<(), FetchError> {
    if json.len() > MAX_RESPONSE_SIZE {
        return Err(FetchError::Parse(format!(
            "Response too large ({:.1} MB, max {} MB)",
            json.len() as f64 / (1024.0 * 1024.0),
            MAX_RESPONSE_SIZE / (1024 * 1024)
        )));
    }
    Ok(())
}

// -- statusCheckRollup GraphQL response --

#[derive(Deserialize, Debug)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize, Debug)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RepositoryData {
    repository: Option<RepositoryNode>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    pull_request: Option<PullRequestNode>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    number: Option<u64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    commits: Nodes<CommitNode>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CommitNode {
    commit: Commit,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Commit {
    status_check_rollup: Option<StatusCheckRollup>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StatusCheckRollup {
    contexts: ContextConnection,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ContextConnection {
    #[serde(default)]
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<CheckContext>>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// One check attached to the head commit. Only `CheckRun` records carry the
/// run fields; status contexts deserialize with everything else empty.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckContext {
    #[serde(rename = "__typename", default)]
    pub typename: String,
    #[serde(default)]
    pub database_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub details_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub check_suite: Option<CheckSuite>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckSuite {
    #[serde(default)]
    pub database_id: Option<u64>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub app: Option<CheckApp>,
    #[serde(default)]
    pub workflow_run: Option<WorkflowRunRef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CheckApp {
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunRef {
    #[serde(default)]
    pub database_id: Option<u64>,
    #[serde(default)]
    pub run_number: Option<u64>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub workflow: Option<WorkflowRef>,
    #[serde(default)]
    pub pending_deployment_requests: Option<Nodes<PendingDeployment>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WorkflowRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PendingDeployment {
    #[serde(default)]
    pub environment: Option<EnvironmentRef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct EnvironmentRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// One page of check contexts plus the pull request they belong to.
#[derive(Debug, Clone)]
pub struct ChecksPage {
    pub pr: PullRequestInfo,
    pub contexts: Vec<CheckContext>,
    pub page_info: PageInfo,
}

pub fn parse_checks_page(json: &str) -> Result<ChecksPage, FetchError> {
    check_response_size(json)?;
    let resp: GraphqlResponse<RepositoryData> =
        serde_json::from_str(json).map_err(|e| FetchError::Parse(e.to_string()))?;

    let pr = resp
        .data
        .and_then(|d| d.repository)
        .and_then(|r| r.pull_request);
    let Some(pr) = pr else {
        let detail = resp
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(FetchError::Parse(if detail.is_empty() {
            "pull request missing from response".to_string()
        } else {
            detail
        }));
    };

    let number = pr
        .number
        .ok_or_else(|| FetchError::Parse("pull request number missing from response".to_string()))?;
    if number == 0 {
        return Err(FetchError::NotFound { number });
    }

    let connection = pr
        .commits
        .nodes
        .into_iter()
        .flatten()
        .next()
        .and_then(|c| c.commit.status_check_rollup)
        .map(|rollup| rollup.contexts);

    let (contexts, page_info) = match connection {
        Some(conn) => (conn.nodes.into_iter().flatten().collect(), conn.page_info),
        None => (Vec::new(), PageInfo::default()),
    };

    Ok(ChecksPage {
        pr: PullRequestInfo {
            number,
            title: pr.title.unwrap_or_default(),
            url: pr.url.unwrap_or_default(),
        },
        contexts,
        page_info,
    })
}

// -- Run jobs (steps) REST response --

#[derive(Deserialize, Debug)]
struct RunJobsResponse {
    #[serde(default)]
    jobs: Vec<RunJob>,
}

#[derive(Deserialize, Debug)]
struct RunJob {
    id: u64,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    steps: Vec<RunStep>,
}

#[derive(Deserialize, Debug)]
struct RunStep {
    number: u64,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl From<RunStep> for Step {
    fn from(s: RunStep) -> Self {
        Step {
            number: s.number,
            name: s.name,
            status: JobState::parse(s.status.as_deref().unwrap_or_default()),
            conclusion: s.conclusion.unwrap_or_default(),
            started_at: s.started_at,
            completed_at: s.completed_at,
        }
    }
}

pub fn parse_run_steps(json: &str) -> Result<Vec<JobSteps>, FetchError> {
    check_response_size(json)?;
    let resp: RunJobsResponse =
        serde_json::from_str(json).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(resp
        .jobs
        .into_iter()
        .map(|j| JobSteps {
            job_id: j.id.to_string(),
            link: j.html_url,
            steps: j.steps.into_iter().map(Step::from).collect(),
        })
        .collect())
}

// -- Check-run output REST response --

#[derive(Deserialize, Debug, Default)]
struct CheckRunResponse {
    #[serde(default)]
    output: Option<CheckRunOutput>,
    #[serde(default)]
    app: Option<CheckRunApp>,
}

#[derive(Deserialize, Debug, Default)]
struct CheckRunApp {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckRunOutput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Concatenates title, summary and text into one markdown document. Falls
/// back to the app description when the check published no output.
pub fn parse_check_run_output(json: &str) -> Result<String, FetchError> {
    check_response_size(json)?;
    let resp: CheckRunResponse =
        serde_json::from_str(json).map_err(|e| FetchError::Parse(e.to_string()))?;
    let output = resp.output.unwrap_or_default();
    let parts: Vec<String> = [output.title, output.summary, output.text]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        return Ok(resp
            .app
            .and_then(|a| a.description)
            .unwrap_or_default());
    }
    Ok(parts.join("\n\n"))
}
