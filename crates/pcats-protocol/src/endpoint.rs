//! Endpoint paths of the PCATS REST API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::form::{FieldSchema, CATE_SCHEMA, DYNAMIC_SCHEMA, STATIC_SCHEMA, UPLOAD_SCHEMA};

/// Opaque job identifier assigned by the service on submission.
///
/// Never empty, and always usable verbatim as a single URL path segment:
/// only unreserved URL characters (ASCII letters, digits, `-`, `.`, `_`,
/// `~`) are accepted, and the dot segments `.` and `..` are not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Wrap a server-issued identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        let unreserved = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
        if id.is_empty() || id == "." || id == ".." || !id.chars().all(unreserved) {
            return Err(ProtocolError::InvalidJobId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// HTTP verb used by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }
}

/// Logical endpoints exposed by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Submit a single-stage (static) analysis
    StaticGp,
    /// Submit a two-stage (dynamic) analysis
    DynamicGp,
    /// Upload a data file, answered with a file reference
    UploadFile,
    /// Current status of a job
    Status(JobId),
    /// Printable summary of a finished job
    Print(JobId),
    /// Structured (JSON) results of a finished job
    Results(JobId),
    /// Printable summary of a finished CATE job
    PrintCate(JobId),
    /// Submit a CATE job derived from a single-stage job
    StaticGpCate(JobId),
    /// Submit a CATE job derived from a two-stage job
    DynamicGpCate(JobId),
    /// Base URL of the interactive plots of a job
    Plot(JobId),
}

const JOB_PREFIX: &str = "/api/job/";

impl Endpoint {
    /// Request path relative to the service base URL.
    pub fn path(&self) -> String {
        match self {
            Endpoint::StaticGp => "/api/staticgp".to_string(),
            Endpoint::DynamicGp => "/api/dynamicgp".to_string(),
            Endpoint::UploadFile => "/api/uploadfile".to_string(),
            Endpoint::Status(id) => format!("{JOB_PREFIX}{id}/status"),
            Endpoint::Print(id) => format!("{JOB_PREFIX}{id}/print"),
            Endpoint::Results(id) => format!("{JOB_PREFIX}{id}/results"),
            Endpoint::PrintCate(id) => format!("{JOB_PREFIX}{id}/printCATE"),
            Endpoint::StaticGpCate(id) => format!("{JOB_PREFIX}{id}/staticgp.cate"),
            Endpoint::DynamicGpCate(id) => format!("{JOB_PREFIX}{id}/dynamicgp.cate"),
            Endpoint::Plot(id) => format!("{JOB_PREFIX}{id}/plot"),
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Endpoint::StaticGp
            | Endpoint::DynamicGp
            | Endpoint::UploadFile
            | Endpoint::StaticGpCate(_)
            | Endpoint::DynamicGpCate(_) => Verb::Post,
            Endpoint::Status(_)
            | Endpoint::Print(_)
            | Endpoint::Results(_)
            | Endpoint::PrintCate(_)
            | Endpoint::Plot(_) => Verb::Get,
        }
    }

    /// Short stable name, used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::StaticGp => "staticgp",
            Endpoint::DynamicGp => "dynamicgp",
            Endpoint::UploadFile => "uploadfile",
            Endpoint::Status(_) => "status",
            Endpoint::Print(_) => "print",
            Endpoint::Results(_) => "results",
            Endpoint::PrintCate(_) => "printCATE",
            Endpoint::StaticGpCate(_) => "staticgp.cate",
            Endpoint::DynamicGpCate(_) => "dynamicgp.cate",
            Endpoint::Plot(_) => "plot",
        }
    }

    /// Declared form schema for endpoints that accept a multipart body.
    pub fn schema(&self) -> Option<&'static FieldSchema> {
        match self {
            Endpoint::StaticGp => Some(&STATIC_SCHEMA),
            Endpoint::DynamicGp => Some(&DYNAMIC_SCHEMA),
            Endpoint::UploadFile => Some(&UPLOAD_SCHEMA),
            Endpoint::StaticGpCate(_) | Endpoint::DynamicGpCate(_) => Some(&CATE_SCHEMA),
            _ => None,
        }
    }

    /// Recover an endpoint from a request path (the inverse of [`Endpoint::path`]).
    pub fn parse(path: &str) -> Option<Endpoint> {
        let path = path.split('?').next().unwrap_or(path);
        match path {
            "/api/staticgp" => return Some(Endpoint::StaticGp),
            "/api/dynamicgp" => return Some(Endpoint::DynamicGp),
            "/api/uploadfile" => return Some(Endpoint::UploadFile),
            _ => {}
        }

        let rest = path.strip_prefix(JOB_PREFIX)?;
        let (id, action) = rest.split_once('/')?;
        let id = JobId::new(id).ok()?;
        let endpoint = match action {
            "status" => Endpoint::Status(id),
            "print" => Endpoint::Print(id),
            "results" => Endpoint::Results(id),
            "printCATE" => Endpoint::PrintCate(id),
            "staticgp.cate" => Endpoint::StaticGpCate(id),
            "dynamicgp.cate" => Endpoint::DynamicGpCate(id),
            "plot" => Endpoint::Plot(id),
            _ => return None,
        };
        Some(endpoint)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb().as_str(), self.path())
    }
}
