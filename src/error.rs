//! Errors carried on fetch-result messages.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Host unreachable, auth failure, `gh` failure or timeout. Retried by the next poll.
    #[error("{0}")]
    Transport(String),

    /// The host answered for a pull request that does not exist.
    #[error("pull request #{number} not found")]
    NotFound { number: u64 },

    /// The response parsed but lacks a required field.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// A single job-log fetch failed; `stderr` is shown in place of the log.
    #[error("{stderr}")]
    SubTransport { stderr: String },
}

impl FetchError {
    /// NotFound and Parse end polling; the UI shows them until quit.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchError::NotFound { .. } | FetchError::Parse(_))
    }
}

impl From<color_eyre::eyre::Report> for FetchError {
    fn from(e: color_eyre::eyre::Report) -> Self {
        FetchError::Transport(format!("{e}"))
    }
}
