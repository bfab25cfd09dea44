//! JSON response bodies.
//!
//! The service's serializer boxes scalars, so `{"jobid": ["abc"]}` and
//! `{"jobid": "abc"}` both occur in practice. Every body accepts either shape
//! and uses the first element of an array.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::endpoint::JobId;
use crate::error::ProtocolError;
use crate::status::JobStatus;

/// A string field that may arrive boxed in a one-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    One(String),
    Boxed(Vec<String>),
}

impl Scalar {
    /// Box a value the way the service does.
    pub fn boxed(value: impl Into<String>) -> Self {
        Scalar::Boxed(vec![value.into()])
    }

    pub fn into_first(self) -> Option<String> {
        match self {
            Scalar::One(s) => Some(s),
            Scalar::Boxed(v) => v.into_iter().next(),
        }
    }
}

fn required(field: Option<Scalar>, name: &'static str) -> Result<String, ProtocolError> {
    field
        .and_then(Scalar::into_first)
        .ok_or(ProtocolError::MissingResponseField(name))
}

/// Decode a JSON body.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(body)?)
}

/// Answer to a job submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobIdBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobid: Option<Scalar>,
}

impl JobIdBody {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            jobid: Some(Scalar::boxed(job_id.as_str())),
        }
    }

    pub fn into_job_id(self) -> Result<JobId, ProtocolError> {
        JobId::new(required(self.jobid, "jobid")?)
    }
}

/// Answer to a status query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Scalar>,
}

impl StatusBody {
    pub fn new(status: &JobStatus) -> Self {
        Self {
            status: Some(Scalar::One(status.as_str().to_string())),
        }
    }

    pub fn into_status(self) -> Result<JobStatus, ProtocolError> {
        Ok(JobStatus::parse(&required(self.status, "status")?))
    }
}

/// Answer to a file upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRefBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fileref: Option<Scalar>,
}

impl FileRefBody {
    pub fn new(fileref: impl Into<String>) -> Self {
        Self {
            fileref: Some(Scalar::boxed(fileref)),
        }
    }

    pub fn into_fileref(self) -> Result<String, ProtocolError> {
        let fileref = required(self.fileref, "fileref")?;
        if fileref.is_empty() {
            return Err(ProtocolError::MissingResponseField("fileref"));
        }
        Ok(fileref)
    }
}

/// Answer to a plot URL query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotUrlBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Scalar>,
}

impl PlotUrlBody {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(Scalar::boxed(url)),
        }
    }

    /// Base URL with an optional plot type appended as a path segment.
    pub fn into_url(self, plot_type: Option<&str>) -> Result<String, ProtocolError> {
        let url = required(self.url, "url")?;
        Ok(match plot_type {
            Some(kind) if !kind.is_empty() => {
                format!("{}/{}", url.trim_end_matches('/'), kind.trim_start_matches('/'))
            }
            _ => url,
        })
    }
}
