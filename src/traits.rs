use crate::app::JobKind;
use crate::error::FetchError;
use async_trait::async_trait;

/// Host API surface the viewer depends on. Fetch methods return the raw
/// response body; `gh::parser` turns it into model values.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// One page of the pull request's check contexts, starting after `cursor`.
    async fn fetch_checks_page(&self, pr: u64, cursor: Option<&str>) -> Result<String, FetchError>;
    async fn fetch_run_steps(&self, run_id: &str) -> Result<String, FetchError>;
    async fn fetch_check_run_output(&self, job_id: &str) -> Result<String, FetchError>;
    /// Raw native-actions log blob. Failures carry the CLI's stderr.
    async fn fetch_job_logs(&self, job_id: &str) -> Result<String, FetchError>;
    async fn rerun_job(&self, job_id: &str, kind: JobKind) -> Result<(), FetchError>;
    async fn rerun_run(&self, run_id: &str, native: bool) -> Result<(), FetchError>;
    fn open_in_browser(&self, url: &str) -> Result<(), FetchError>;
}
