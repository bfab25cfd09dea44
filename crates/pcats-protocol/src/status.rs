//! Job status vocabulary
//!
//! Job lifecycle as observed by the client:
//! Submitted → {Pending | Running}* → {Done | Error}
//!
//! The server owns the vocabulary. Any token starting with "Error" is a
//! failure and any token the client does not recognise is treated as still
//! in progress.

use std::fmt;

/// Status token reported by the service for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted, waiting for a worker
    Pending,
    /// Being computed
    Running,
    /// Finished successfully
    Done,
    /// Failed; holds the raw token (e.g. "Error" or "Error: singular matrix")
    Error(String),
    /// Any other token, treated as non-terminal
    Unknown(String),
}

/// The bare error token, also used as the client-side failure sentinel.
pub const ERROR_TOKEN: &str = "Error";

impl JobStatus {
    /// Interpret a status token reported by the service.
    ///
    /// Surrounding whitespace is ignored when matching the known vocabulary.
    /// Error and unknown tokens keep the server's text untouched.
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "Pending" => JobStatus::Pending,
            "Running" => JobStatus::Running,
            "Done" => JobStatus::Done,
            t if t.starts_with(ERROR_TOKEN) => JobStatus::Error(token.to_string()),
            _ => JobStatus::Unknown(token.to_string()),
        }
    }

    /// The failure sentinel.
    pub fn error() -> Self {
        JobStatus::Error(ERROR_TOKEN.to_string())
    }

    /// Done and Error are sticky; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error(_))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Done)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JobStatus::Error(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Done => "Done",
            JobStatus::Error(raw) | JobStatus::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
