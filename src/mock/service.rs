//! Mock Service Implementation
//!
//! In-process stand-in for the PCATS REST service. Answers every endpoint
//! with bodies shaped like the real service's (scalars boxed in arrays),
//! and records each request it sees.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pcats_protocol::{
    Endpoint, FieldValue, FileRefBody, JobId, JobIdBody, JobStatus, PlotUrlBody, StatusBody,
    HEADER_REUSE_CACHED_JOBID, HEADER_USE_CACHE,
};
use serde_json::json;
use tracing::debug;

use crate::host::transport::{HttpRequest, HttpResponse, TransportError};

use super::failure::{FailureConfig, FailureInjector, FailureMode};
use super::state::{JobKind, MockJob, MockState};

/// Base of the plot URLs handed out by the mock
pub const MOCK_PLOT_BASE: &str = "https://pcats.mock/plots";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn error_response(status: u16, message: impl Into<String>) -> HttpResponse {
    let body = json!({ "error": [message.into()] }).to_string();
    HttpResponse::new(status, body)
}

/// 200 with a JSON body, or a 500 when the body cannot be encoded
fn json_response<T: serde::Serialize>(value: &T) -> HttpResponse {
    HttpResponse::json(value)
        .unwrap_or_else(|e| error_response(500, format!("cannot encode response: {}", e)))
}

fn bad_request(message: impl Into<String>) -> HttpResponse {
    error_response(400, message)
}

fn not_found(job_id: &JobId) -> HttpResponse {
    error_response(404, format!("job {} not found", job_id))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn content_digest(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{}#{:016x}", content.len(), hasher.finish())
}

/// Configurable mock service for testing
///
/// Cloning is cheap; clones share state, so a test can keep a handle while
/// the client owns the transport.
#[derive(Clone)]
pub struct MockService {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    /// Status sequence given to newly submitted jobs
    progression: Arc<Mutex<Vec<JobStatus>>>,
    /// Token every request must carry (None = open service)
    required_token: Arc<Mutex<Option<String>>>,
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new())),
            failures: Arc::new(Mutex::new(FailureInjector::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            progression: Arc::new(Mutex::new(vec![
                JobStatus::Pending,
                JobStatus::Running,
                JobStatus::Done,
            ])),
            required_token: Arc::new(Mutex::new(None)),
        }
    }

    // === Public API for test configuration ===

    /// Inject a failure for an endpoint (by `Endpoint::name()`)
    pub fn inject(&self, endpoint: &str, config: FailureConfig) {
        lock(&self.failures).inject(endpoint, config);
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Status sequence for jobs submitted from now on
    pub fn set_progression(&self, statuses: Vec<JobStatus>) {
        *lock(&self.progression) = statuses;
    }

    /// Replace the remaining status sequence of one job
    pub fn set_job_progression(&self, job_id: &JobId, statuses: Vec<JobStatus>) -> bool {
        let mut state = lock(&self.state);
        match state.get_job_mut(job_id) {
            Some(job) => {
                job.progression = statuses;
                job.step = 0;
                true
            }
            None => false,
        }
    }

    /// Reject requests lacking `Authorization: Bearer <token>`
    pub fn require_token(&self, token: impl Into<String>) {
        *lock(&self.required_token) = Some(token.into());
    }

    /// Store a file as if uploaded, returning its reference
    pub fn store_upload(&self, name: &str, content: Vec<u8>) -> String {
        lock(&self.state).store_upload(name, content)
    }

    /// Snapshot of a job
    pub fn job(&self, job_id: &JobId) -> Option<MockJob> {
        lock(&self.state).get_job(job_id).cloned()
    }

    pub fn job_count(&self) -> usize {
        lock(&self.state).jobs.len()
    }

    /// Content of an uploaded file
    pub fn upload_content(&self, fileref: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .uploads
            .get(fileref)
            .map(|u| u.content.clone())
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Forget the recorded requests
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    // === Request handling ===

    /// Answer one request
    ///
    /// Transport errors stand for failures a real connection would report:
    /// injected connection failures and unreadable local files.
    pub fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request.clone());
        let name = request.endpoint.name();
        debug!(endpoint = name, path = %request.endpoint.path(), "mock request");

        let failure = lock(&self.failures).check(name);
        if let Some(failure) = failure {
            if let Some(delay) = failure.delay {
                std::thread::sleep(delay);
            }
            match failure.mode {
                Some(FailureMode::Transport(message)) => {
                    return Err(TransportError::ConnectionFailed(message))
                }
                Some(FailureMode::Http { status, body }) => {
                    return Ok(HttpResponse::new(status, body))
                }
                Some(FailureMode::MalformedBody) => {
                    return Ok(HttpResponse::new(200, "<html>502 Bad Gateway</html>"))
                }
                None => {}
            }
        }

        if !self.authorized(request) {
            return Ok(error_response(401, "missing or invalid token"));
        }

        self.dispatch(request)
    }

    // === Internal helpers ===

    fn authorized(&self, request: &HttpRequest) -> bool {
        match lock(&self.required_token).as_deref() {
            Some(token) => {
                request.header("Authorization") == Some(format!("Bearer {}", token).as_str())
            }
            None => true,
        }
    }

    fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        match &request.endpoint {
            Endpoint::StaticGp => self.handle_submit(request, JobKind::Static, None),
            Endpoint::DynamicGp => self.handle_submit(request, JobKind::Dynamic, None),
            Endpoint::StaticGpCate(id) => {
                self.handle_submit(request, JobKind::StaticCate, Some(id))
            }
            Endpoint::DynamicGpCate(id) => {
                self.handle_submit(request, JobKind::DynamicCate, Some(id))
            }
            Endpoint::UploadFile => self.handle_upload(request),
            Endpoint::Status(id) => Ok(self.handle_status(id)),
            Endpoint::Print(id) => Ok(self.handle_print(id, false)),
            Endpoint::PrintCate(id) => Ok(self.handle_print(id, true)),
            Endpoint::Results(id) => Ok(self.handle_results(id)),
            Endpoint::Plot(id) => Ok(self.handle_plot(id)),
        }
    }

    // === Endpoint handlers ===

    fn handle_upload(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let Some(FieldValue::File(path)) = request.form.as_ref().and_then(|f| f.get("file")) else {
            return Ok(bad_request("expected a file part named 'file'"));
        };

        let content = std::fs::read(path)?;
        let fileref = lock(&self.state).store_upload(file_name(path), content);
        Ok(json_response(&FileRefBody::new(fileref)))
    }

    fn handle_submit(
        &self,
        request: &HttpRequest,
        kind: JobKind,
        parent: Option<&JobId>,
    ) -> Result<HttpResponse, TransportError> {
        let Some(form) = request.form.as_ref() else {
            return Ok(bad_request("missing form body"));
        };
        if let Some(schema) = request.endpoint.schema() {
            if let Err(e) = form.validate(schema) {
                return Ok(bad_request(e.to_string()));
            }
        }

        let mut state = lock(&self.state);

        if let (Some(parent_id), Some(parent_kind)) = (parent, kind.cate_parent()) {
            match state.get_job(parent_id) {
                None => return Ok(not_found(parent_id)),
                Some(job) if job.kind != parent_kind => {
                    return Ok(bad_request(format!(
                        "job {} is not a {} job",
                        parent_id,
                        parent_kind.label()
                    )))
                }
                Some(job) if !job.current().is_done() => {
                    return Ok(error_response(409, format!("job {} has not finished", parent_id)))
                }
                Some(_) => {}
            }
        }

        let mut fields = Vec::new();
        let mut fingerprint = vec![request.endpoint.path()];
        for (name, value) in form.fields() {
            let (text, digest) = match value {
                FieldValue::Text(text) => (text.clone(), text.clone()),
                FieldValue::FileRef(fileref) => {
                    let Some(upload) = state.uploads.get(fileref) else {
                        return Ok(bad_request(format!(
                            "unknown file reference '{}' in field '{}'",
                            fileref, name
                        )));
                    };
                    (fileref.clone(), content_digest(&upload.content))
                }
                FieldValue::File(path) => {
                    let content = std::fs::read(path)?;
                    let digest = content_digest(&content);
                    (state.store_upload(file_name(path), content), digest)
                }
            };
            fields.push((name.clone(), text));
            fingerprint.push(format!("{}={}", name, digest));
        }
        fingerprint.sort();
        let fingerprint = fingerprint.join("&");

        let use_cache = request.header(HEADER_USE_CACHE) == Some("1");
        let reuse = use_cache && request.header(HEADER_REUSE_CACHED_JOBID) == Some("1");
        if reuse {
            if let Some(job_id) = state.cache.get(&fingerprint) {
                debug!(%job_id, "reusing cached job");
                return Ok(json_response(&JobIdBody::new(job_id)));
            }
        }

        let job_id = JobId::new(uuid::Uuid::new_v4().to_string())
            .map_err(|e| TransportError::Other(e.to_string()))?;
        let mut job = MockJob::new(job_id.clone(), kind, lock(&self.progression).clone());
        job.parent = parent.cloned();
        job.fields = fields;
        state.insert_job(job);
        if use_cache {
            state.cache.insert(fingerprint, job_id.clone());
        }

        Ok(json_response(&JobIdBody::new(&job_id)))
    }

    fn handle_status(&self, job_id: &JobId) -> HttpResponse {
        let mut state = lock(&self.state);
        match state.get_job_mut(job_id) {
            Some(job) => json_response(&StatusBody::new(&job.advance())),
            None => not_found(job_id),
        }
    }

    /// Look up a finished job, or the response explaining why it is unavailable
    fn finished_job(&self, job_id: &JobId) -> Result<MockJob, HttpResponse> {
        let state = lock(&self.state);
        let job = state.get_job(job_id).ok_or_else(|| not_found(job_id))?;
        match job.current() {
            JobStatus::Done => Ok(job.clone()),
            status => Err(bad_request(format!(
                "job {} is not finished (status: {})",
                job_id, status
            ))),
        }
    }

    fn handle_print(&self, job_id: &JobId, cate: bool) -> HttpResponse {
        let job = match self.finished_job(job_id) {
            Ok(job) => job,
            Err(response) => return response,
        };
        if job.kind.is_cate() != cate {
            return bad_request(format!("job {} is a {} job", job_id, job.kind.label()));
        }

        let mut text = format!("PCATS {} analysis {}\n", job.kind.label(), job.job_id);
        if let Some(parent) = &job.parent {
            text.push_str(&format!("Derived from: {}\n", parent));
        }
        for name in ["method", "outcome", "treatment", "stg2.outcome", "x", "control.tr", "treat.tr"] {
            if let Some(value) = job.field(name) {
                text.push_str(&format!("{}: {}\n", name, value));
            }
        }
        text.push_str("Average treatment effect: 0.42 (95% CI 0.10, 0.74)\n");
        HttpResponse::new(200, text)
    }

    fn handle_results(&self, job_id: &JobId) -> HttpResponse {
        let job = match self.finished_job(job_id) {
            Ok(job) => job,
            Err(response) => return response,
        };
        let body = json!({
            "jobid": [job.job_id.as_str()],
            "method": [job.field("method").unwrap_or("BART")],
            "ate": [{ "estimate": 0.42, "lower": 0.10, "upper": 0.74 }],
        });
        HttpResponse::new(200, body.to_string())
    }

    fn handle_plot(&self, job_id: &JobId) -> HttpResponse {
        if lock(&self.state).get_job(job_id).is_none() {
            return not_found(job_id);
        }
        json_response(&PlotUrlBody::new(format!("{}/{}", MOCK_PLOT_BASE, job_id)))
    }
}
