//! Mock Service State
//!
//! Jobs, uploaded files and the submission cache of the mock service.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pcats_protocol::{JobId, JobStatus};

/// Which analysis produced a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Static,
    Dynamic,
    StaticCate,
    DynamicCate,
}

impl JobKind {
    pub fn is_cate(&self) -> bool {
        matches!(self, JobKind::StaticCate | JobKind::DynamicCate)
    }

    /// Kind of the job a CATE submission must derive from
    pub fn cate_parent(&self) -> Option<JobKind> {
        match self {
            JobKind::StaticCate => Some(JobKind::Static),
            JobKind::DynamicCate => Some(JobKind::Dynamic),
            JobKind::Static | JobKind::Dynamic => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Static => "static",
            JobKind::Dynamic => "dynamic",
            JobKind::StaticCate => "static CATE",
            JobKind::DynamicCate => "dynamic CATE",
        }
    }
}

/// A job accepted by the mock service
#[derive(Debug, Clone)]
pub struct MockJob {
    pub job_id: JobId,
    pub kind: JobKind,
    /// Job this CATE job was derived from
    pub parent: Option<JobId>,
    /// Text fields as submitted
    pub fields: Vec<(String, String)>,
    /// Statuses reported on successive polls; the last one repeats
    pub progression: Vec<JobStatus>,
    /// Index of the status the next poll reports
    pub step: usize,
    /// Statuses reported so far
    pub status_history: Vec<(JobStatus, DateTime<Utc>)>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MockJob {
    pub fn new(job_id: JobId, kind: JobKind, progression: Vec<JobStatus>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            kind,
            parent: None,
            fields: Vec::new(),
            progression,
            step: 0,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Status as of the last poll, without advancing
    pub fn current(&self) -> JobStatus {
        self.status_history
            .last()
            .map(|(status, _)| status.clone())
            .unwrap_or(JobStatus::Pending)
    }

    /// Report the next status and move one step forward
    pub fn advance(&mut self) -> JobStatus {
        let status = match self.progression.get(self.step) {
            Some(status) => status.clone(),
            None => self
                .progression
                .last()
                .cloned()
                .unwrap_or(JobStatus::Done),
        };
        if self.step < self.progression.len() {
            self.step += 1;
        }

        let now = Utc::now();
        self.status_history.push((status.clone(), now));
        self.updated_at = now;
        status
    }

    /// Value of a submitted text field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A file stored through the upload endpoint
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Original file name
    pub name: String,
    pub content: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

/// Mock service state container
#[derive(Debug, Default)]
pub struct MockState {
    /// Jobs by id
    pub jobs: HashMap<JobId, MockJob>,
    /// Uploads by file reference
    pub uploads: HashMap<String, StoredUpload>,
    /// Job ids of earlier submissions, by submission fingerprint
    pub cache: HashMap<String, JobId>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_job(&self, job_id: &JobId) -> Option<&MockJob> {
        self.jobs.get(job_id)
    }

    pub fn get_job_mut(&mut self, job_id: &JobId) -> Option<&mut MockJob> {
        self.jobs.get_mut(job_id)
    }

    pub fn insert_job(&mut self, job: MockJob) {
        self.jobs.insert(job.job_id.clone(), job);
    }

    pub fn has_upload(&self, fileref: &str) -> bool {
        self.uploads.contains_key(fileref)
    }

    /// Store an upload under a fresh reference
    pub fn store_upload(&mut self, name: impl Into<String>, content: Vec<u8>) -> String {
        let fileref = format!("file-{}", uuid::Uuid::new_v4().simple());
        self.uploads.insert(
            fileref.clone(),
            StoredUpload {
                name: name.into(),
                content,
                uploaded_at: Utc::now(),
            },
        );
        fileref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(progression: Vec<JobStatus>) -> MockJob {
        MockJob::new(JobId::new("job-1").unwrap(), JobKind::Static, progression)
    }

    #[test]
    fn test_advance_walks_progression_then_sticks() {
        let mut job = job(vec![JobStatus::Pending, JobStatus::Running, JobStatus::Done]);

        assert_eq!(job.advance(), JobStatus::Pending);
        assert_eq!(job.advance(), JobStatus::Running);
        assert_eq!(job.advance(), JobStatus::Done);
        assert_eq!(job.advance(), JobStatus::Done);
        assert_eq!(job.status_history.len(), 4);
        assert_eq!(job.current(), JobStatus::Done);
    }

    #[test]
    fn test_current_before_first_poll() {
        let job = job(vec![JobStatus::Done]);
        assert_eq!(job.current(), JobStatus::Pending);
    }

    #[test]
    fn test_empty_progression_finishes() {
        let mut job = job(Vec::new());
        assert_eq!(job.advance(), JobStatus::Done);
    }

    #[test]
    fn test_cate_kinds() {
        assert_eq!(JobKind::StaticCate.cate_parent(), Some(JobKind::Static));
        assert_eq!(JobKind::DynamicCate.cate_parent(), Some(JobKind::Dynamic));
        assert!(JobKind::Static.cate_parent().is_none());
        assert!(JobKind::DynamicCate.is_cate());
    }

    #[test]
    fn test_store_upload_unique_refs() {
        let mut state = MockState::new();
        let a = state.store_upload("a.csv", vec![1]);
        let b = state.store_upload("a.csv", vec![1]);

        assert_ne!(a, b);
        assert!(state.has_upload(&a));
        assert_eq!(state.uploads[&b].name, "a.csv");
    }
}
