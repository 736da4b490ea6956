use crate::app::JobKind;
use crate::error::FetchError;
use crate::traits::HostClient;
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

const GH_TIMEOUT: Duration = Duration::from_secs(30);

/// Returned by the host when the pull request number does not exist.
const PR_NOT_FOUND: &str = "Could not resolve to a PullRequest";

const CHECKS_QUERY: &str = r"
query($owner: String!, $name: String!, $number: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      number
      title
      url
      commits(last: 1) {
        nodes {
          commit {
            statusCheckRollup {
              contexts(first: 100, after: $after) {
                pageInfo { hasNextPage endCursor }
                nodes {
                  __typename
                  ... on CheckRun {
                    databaseId
                    name
                    detailsUrl
                    url
                    status
                    conclusion
                    startedAt
                    completedAt
                    title
                    checkSuite {
                      databaseId
                      conclusion
                      app { name }
                      workflowRun {
                        databaseId
                        runNumber
                        event
                        url
                        workflow { name }
                        pendingDeploymentRequests(first: 1) {
                          nodes { environment { name } }
                        }
                      }
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}";

pub struct GhClient {
    pub repo: String,
}

impl GhClient {
    pub fn new(repo: String) -> Self {
        Self { repo }
    }

    fn owner_and_name(&self) -> Result<(&str, &str), FetchError> {
        self.repo
            .split_once('/')
            .ok_or_else(|| FetchError::Parse(format!("invalid repository: {}", self.repo)))
    }
}

#[async_trait]
impl HostClient for GhClient {
    async fn fetch_checks_page(&self, pr: u64, cursor: Option<&str>) -> Result<String, FetchError> {
        let (owner, name) = self.owner_and_name()?;
        let query = format!("query={CHECKS_QUERY}");
        let owner = format!("owner={owner}");
        let name = format!("name={name}");
        let number = format!("number={pr}");
        let after = cursor.map(|c| format!("after={c}"));
        let mut args = vec![
            "api", "graphql",
            "-f", &query,
            "-f", &owner,
            "-f", &name,
            "-F", &number,
        ];
        if let Some(after) = &after {
            args.push("-f");
            args.push(after);
        }

        let output = gh_output(&args).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains(PR_NOT_FOUND) {
            return Err(FetchError::NotFound { number: pr });
        }
        Err(FetchError::Transport(classify_gh_error(&stderr)))
    }

    async fn fetch_run_steps(&self, run_id: &str) -> Result<String, FetchError> {
        let path = format!("repos/{}/actions/runs/{run_id}/jobs?per_page=100", self.repo);
        Ok(run_gh(&["api", &path]).await?)
    }

    async fn fetch_check_run_output(&self, job_id: &str) -> Result<String, FetchError> {
        let path = format!("repos/{}/check-runs/{job_id}", self.repo);
        Ok(run_gh(&["api", &path]).await?)
    }

    async fn fetch_job_logs(&self, job_id: &str) -> Result<String, FetchError> {
        let output = gh_output(&["run", "view", "--repo", &self.repo, "--job", job_id, "--log"])
            .await
            .map_err(|e| FetchError::SubTransport {
                stderr: e.to_string(),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(FetchError::SubTransport {
                stderr: if stderr.is_empty() {
                    "gh run view failed".to_string()
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn rerun_job(&self, job_id: &str, kind: JobKind) -> Result<(), FetchError> {
        let path = match kind {
            JobKind::NativeActions => format!("repos/{}/actions/jobs/{job_id}/rerun", self.repo),
            JobKind::ExternalCheck | JobKind::GenericCheckRun => {
                format!("repos/{}/check-runs/{job_id}/rerequest", self.repo)
            }
        };
        run_gh(&["api", "-X", "POST", &path]).await?;
        Ok(())
    }

    async fn rerun_run(&self, run_id: &str, native: bool) -> Result<(), FetchError> {
        if native {
            run_gh(&["run", "rerun", "--repo", &self.repo, run_id]).await?;
        } else {
            let path = format!("repos/{}/check-suites/{run_id}/rerequest", self.repo);
            run_gh(&["api", "-X", "POST", &path]).await?;
        }
        Ok(())
    }

    fn open_in_browser(&self, url: &str) -> Result<(), FetchError> {
        open_in_browser_impl(url).map_err(FetchError::from)
    }
}

pub async fn check_gh_available() -> Result<()> {
    run_gh(&["auth", "status"]).await.map(|_| ())
}

pub async fn detect_repo() -> Result<String> {
    let output = run_gh(&[
        "repo",
        "view",
        "--json",
        "nameWithOwner",
        "-q",
        ".nameWithOwner",
    ])
    .await?;
    let repo = output.trim().to_string();
    if repo.is_empty() {
        return Err(eyre!("Could not detect repository. Use --repo flag."));
    }
    Ok(repo)
}

async fn gh_output(args: &[&str]) -> Result<Output> {
    let start = std::time::Instant::now();
    let output = tokio::time::timeout(GH_TIMEOUT, Command::new("gh").args(args).output())
        .await
        .map_err(|_| eyre!("gh command timed out after {}s", GH_TIMEOUT.as_secs()))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                eyre!("gh CLI not found. Install it from https://cli.github.com/")
            } else {
                eyre!("Failed to run gh: {}", e)
            }
        })?;
    tracing::debug!(
        args = ?args.first().zip(args.get(1)),
        status = ?output.status.code(),
        elapsed_ms = start.elapsed().as_millis(),
        "gh command completed"
    );
    Ok(output)
}

async fn run_gh(args: &[&str]) -> Result<String> {
    let output = gh_output(args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(eyre!("{}", classify_gh_error(&stderr)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub fn classify_gh_error(stderr: &str) -> String {
    if stderr.contains("not logged") || stderr.contains("auth login") {
        "Not authenticated with gh. Run `gh auth login` first.".to_string()
    } else if stderr.contains("not a git repository") || stderr.contains("could not determine") {
        "Not in a GitHub repository. Use --repo flag or cd into a repo.".to_string()
    } else {
        let trimmed = stderr.trim();
        if trimmed.is_empty() {
            "gh command failed".to_string()
        } else {
            format!("gh command failed: {trimmed}")
        }
    }
}

/// Opens a URL in the user's default browser.
fn open_in_browser_impl(url: &str) -> Result<()> {
    use std::process::{Command, Stdio};

    let scheme = url::Url::parse(url)
        .map_err(|e| eyre!("Invalid URL {url}: {e}"))?
        .scheme()
        .to_string();
    if scheme != "https" && scheme != "http" {
        return Err(eyre!("Refusing to open non-HTTP URL: {url}"));
    }

    let (cmd, args): (&str, Vec<&str>) = if cfg!(target_os = "macos") {
        ("open", vec![url])
    } else if cfg!(target_os = "windows") {
        // empty title so the URL is not taken as the window title
        ("cmd", vec!["/C", "start", "", url])
    } else if std::env::var_os("WSL_DISTRO_NAME").is_some() {
        ("wslview", vec![url])
    } else {
        ("xdg-open", vec![url])
    };
    Command::new(cmd)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| eyre!("Failed to open browser with {cmd}: {e}"))
}
