//! PCATS Job Client
//!
//! Submits analysis jobs, polls their status and downloads results. Every
//! call is a single request/response exchange; the only loop is the status
//! poll in [`JobClient::wait`].
//!
//! Two surfaces are offered. The `Result` API reports what went wrong. The
//! sentinel API (`poll_status`, `await_completion`) never fails and collapses
//! every failure into `JobStatus::Error`, matching the service's reference
//! clients.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pcats_protocol::response::decode;
use pcats_protocol::{
    CateParams, DynamicParams, Endpoint, FileRefBody, JobId, JobIdBody, JobStatus, MultipartForm,
    PlotUrlBody, ProtocolError, RequestOptions, StaticParams, StatusBody,
};
use tracing::{debug, info, warn};

use super::poll::{PollBudget, PollConfig};
use super::transport::{HttpConfig, HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};

/// Job client configuration
#[derive(Debug, Clone, Default)]
pub struct JobClientConfig {
    /// Header options applied when a call leaves them unset
    pub defaults: RequestOptions,
    /// Poll loop used by `wait` and `await_completion`
    pub poll: PollConfig,
}

/// Job client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Job {job_id} not finished after {polls} status checks ({elapsed:?})")]
    Timeout {
        job_id: String,
        polls: u64,
        elapsed: Duration,
    },

    #[error("Response is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

/// Failure kind for exit code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection, DNS, timeout or local file failures (exit code 20)
    Transport = 20,
    /// Non-200 answers (exit code 30)
    Http = 30,
    /// Invalid parameters or unexpected response shapes (exit code 40)
    Protocol = 40,
    /// The job itself reported an error (exit code 50)
    JobFailed = 50,
    /// Poll budget exhausted (exit code 60)
    Timeout = 60,
}

impl FailureKind {
    /// Get exit code for this failure kind
    pub fn exit_code(&self) -> i32 {
        *self as i32
    }
}

impl ClientError {
    /// Map error to failure kind for exit code
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ClientError::Transport(_) => FailureKind::Transport,
            ClientError::Http { .. } => FailureKind::Http,
            ClientError::Protocol(_) => FailureKind::Protocol,
            ClientError::Decode(_) => FailureKind::Protocol,
            ClientError::Timeout { .. } => FailureKind::Timeout,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind().exit_code()
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Remote job client
pub struct JobClient {
    transport: Arc<dyn Transport>,
    config: JobClientConfig,
}

impl JobClient {
    /// Create a new client with the given transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, JobClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(transport: Arc<dyn Transport>, config: JobClientConfig) -> Self {
        Self { transport, config }
    }

    /// Create a client that talks HTTP to a live service
    pub fn connect(http: HttpConfig, config: JobClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(http)?;
        Ok(Self::with_config(Arc::new(transport), config))
    }

    pub fn config(&self) -> &JobClientConfig {
        &self.config
    }

    // === Submissions ===

    /// Submit a single-stage analysis
    pub fn submit_static(&self, params: &StaticParams) -> ClientResult<JobId> {
        self.submit(Endpoint::StaticGp, params.to_form(), &params.options)
    }

    /// Submit a two-stage analysis
    pub fn submit_dynamic(&self, params: &DynamicParams) -> ClientResult<JobId> {
        self.submit(Endpoint::DynamicGp, params.to_form(), &params.options)
    }

    /// Submit a CATE job derived from a finished single-stage job
    pub fn submit_static_cate(&self, job_id: &JobId, params: &CateParams) -> ClientResult<JobId> {
        self.submit(
            Endpoint::StaticGpCate(job_id.clone()),
            params.to_form(),
            &params.options,
        )
    }

    /// Submit a CATE job derived from a finished two-stage job
    pub fn submit_dynamic_cate(&self, job_id: &JobId, params: &CateParams) -> ClientResult<JobId> {
        self.submit(
            Endpoint::DynamicGpCate(job_id.clone()),
            params.to_form(),
            &params.options,
        )
    }

    /// Upload a local file, returning a reference usable in later submissions
    pub fn upload_file(&self, path: &Path) -> ClientResult<String> {
        let form = MultipartForm::new().file("file", path);
        let response = self.post_form(Endpoint::UploadFile, form, &RequestOptions::default())?;
        let fileref = decode::<FileRefBody>(&response.body)?.into_fileref()?;
        info!(path = %path.display(), %fileref, "uploaded file");
        Ok(fileref)
    }

    // === Status ===

    /// Get job status
    pub fn status(&self, job_id: &JobId) -> ClientResult<JobStatus> {
        let response = self.get(Endpoint::Status(job_id.clone()))?;
        Ok(decode::<StatusBody>(&response.body)?.into_status()?)
    }

    /// Get job status, reporting every failure as the `Error` sentinel
    ///
    /// An absent job id yields the sentinel without touching the network.
    pub fn poll_status(&self, job_id: Option<&JobId>) -> JobStatus {
        let Some(job_id) = job_id else {
            warn!("status requested without a job id");
            return JobStatus::error();
        };

        match self.status(job_id) {
            Ok(status) => status,
            Err(e) => {
                warn!(%job_id, error = %e, "status check failed");
                JobStatus::error()
            }
        }
    }

    /// Block until the job reaches a terminal status, using the configured poll loop
    pub fn wait(&self, job_id: &JobId) -> ClientResult<JobStatus> {
        self.wait_with(job_id, &self.config.poll)
    }

    /// Block until the job reaches a terminal status
    ///
    /// A failed status check ends the wait immediately; nothing is retried.
    /// Returns `Timeout` only when the poll config sets a bound.
    pub fn wait_with(&self, job_id: &JobId, poll: &PollConfig) -> ClientResult<JobStatus> {
        let mut budget = PollBudget::start(*poll);

        loop {
            let status = self.status(job_id)?;
            budget.record_poll();

            if status.is_terminal() {
                info!(%job_id, %status, polls = budget.polls(), "job finished");
                return Ok(status);
            }

            if budget.exhausted() {
                return Err(ClientError::Timeout {
                    job_id: job_id.to_string(),
                    polls: budget.polls(),
                    elapsed: budget.elapsed(),
                });
            }

            debug!(%job_id, %status, "job not finished yet");
            std::thread::sleep(budget.next_sleep());
        }
    }

    /// Block until the job finishes, returning `Done` or an `Error` status
    ///
    /// Never returns a non-terminal status. Transport failures, bad answers
    /// and exhausted poll budgets all come back as the `Error` sentinel.
    pub fn await_completion(&self, job_id: Option<&JobId>) -> JobStatus {
        let Some(job_id) = job_id else {
            warn!("wait requested without a job id");
            return JobStatus::error();
        };

        match self.wait(job_id) {
            Ok(status) => status,
            Err(e) => {
                warn!(%job_id, error = %e, "wait failed");
                JobStatus::error()
            }
        }
    }

    // === Results ===

    /// Printable summary of a finished job
    pub fn print(&self, job_id: &JobId) -> ClientResult<String> {
        self.get_text(Endpoint::Print(job_id.clone()))
    }

    /// Printable summary of a finished CATE job
    pub fn print_cate(&self, job_id: &JobId) -> ClientResult<String> {
        self.get_text(Endpoint::PrintCate(job_id.clone()))
    }

    /// Structured results of a finished job, as JSON text
    pub fn results(&self, job_id: &JobId) -> ClientResult<String> {
        self.get_text(Endpoint::Results(job_id.clone()))
    }

    /// URL of the interactive plots, optionally narrowed to one plot type
    pub fn plot_url(&self, job_id: &JobId, plot_type: Option<&str>) -> ClientResult<String> {
        let response = self.get(Endpoint::Plot(job_id.clone()))?;
        Ok(decode::<PlotUrlBody>(&response.body)?.into_url(plot_type)?)
    }

    // === Internal Helpers ===

    fn submit(
        &self,
        endpoint: Endpoint,
        form: MultipartForm,
        options: &RequestOptions,
    ) -> ClientResult<JobId> {
        let name = endpoint.name();
        let response = self.post_form(endpoint, form, options)?;
        let job_id = decode::<JobIdBody>(&response.body)?.into_job_id()?;
        info!(endpoint = name, %job_id, "job submitted");
        Ok(job_id)
    }

    /// Validate a form against the endpoint schema and post it
    fn post_form(
        &self,
        endpoint: Endpoint,
        form: MultipartForm,
        options: &RequestOptions,
    ) -> ClientResult<HttpResponse> {
        if let Some(schema) = endpoint.schema() {
            form.validate(schema)?;
        }

        let request = self.request(endpoint, options).with_form(form);
        self.execute(&request)
    }

    fn get(&self, endpoint: Endpoint) -> ClientResult<HttpResponse> {
        let request = self.request(endpoint, &RequestOptions::default());
        self.execute(&request)
    }

    fn get_text(&self, endpoint: Endpoint) -> ClientResult<String> {
        let response = self.get(endpoint)?;
        Ok(String::from_utf8(response.body)?)
    }

    fn request(&self, endpoint: Endpoint, options: &RequestOptions) -> HttpRequest {
        let options = options.or(&self.config.defaults);
        options
            .headers()
            .into_iter()
            .fold(HttpRequest::new(endpoint), |request, (name, value)| {
                request.with_header(name, value)
            })
    }

    /// Send a request; anything but 200 is an error
    fn execute(&self, request: &HttpRequest) -> ClientResult<HttpResponse> {
        let response = self.transport.execute(request)?;

        if !response.is_ok() {
            return Err(ClientError::Http {
                endpoint: request.endpoint.name(),
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::transport::MockTransport;
    use crate::mock::{FailureConfig, MockService};
    use pcats_protocol::DataSource;

    fn create_client() -> (JobClient, MockService) {
        let transport = MockTransport::new();
        let service = transport.service().clone();
        let config = JobClientConfig {
            poll: PollConfig::immediate(),
            ..JobClientConfig::default()
        };
        (JobClient::with_config(Arc::new(transport), config), service)
    }

    fn static_params(service: &MockService) -> StaticParams {
        let fileref = service.store_upload("obs.csv", b"Y,A\n1,0\n".to_vec());
        StaticParams::new(DataSource::fileref(fileref), "Y", "A")
    }

    #[test]
    fn test_submit_static_returns_job_id() {
        let (client, service) = create_client();

        let job_id = client.submit_static(&static_params(&service)).unwrap();

        assert!(!job_id.as_str().is_empty());
        assert!(service.job(&job_id).is_some());
    }

    #[test]
    fn test_invalid_form_never_reaches_transport() {
        let (client, service) = create_client();
        let params = StaticParams::new(DataSource::fileref("ref"), "", "A");

        let result = client.submit_static(&params);
        assert!(matches!(
            result,
            Err(ClientError::Protocol(ProtocolError::MissingRequired { .. }))
        ));
        assert!(service.requests().is_empty());
    }

    #[test]
    fn test_poll_status_none_skips_network() {
        let (client, service) = create_client();

        assert_eq!(client.poll_status(None), JobStatus::error());
        assert!(service.requests().is_empty());
    }

    #[test]
    fn test_poll_status_fails_closed() {
        let (client, service) = create_client();
        let job_id = client.submit_static(&static_params(&service)).unwrap();

        service.inject("status", FailureConfig::http(500, "boom"));
        assert_eq!(client.poll_status(Some(&job_id)), JobStatus::error());

        service.inject("status", FailureConfig::malformed_body());
        assert_eq!(client.poll_status(Some(&job_id)), JobStatus::error());

        service.inject("status", FailureConfig::transport("connection refused"));
        assert_eq!(client.poll_status(Some(&job_id)), JobStatus::error());
    }

    #[test]
    fn test_wait_reaches_done() {
        let (client, service) = create_client();
        let job_id = client.submit_static(&static_params(&service)).unwrap();

        let status = client.wait(&job_id).unwrap();
        assert_eq!(status, JobStatus::Done);
    }

    #[test]
    fn test_wait_respects_max_polls() {
        let (client, service) = create_client();
        service.set_progression(vec![JobStatus::Running]);
        let job_id = client.submit_static(&static_params(&service)).unwrap();

        let poll = PollConfig::immediate().with_max_polls(3);
        let result = client.wait_with(&job_id, &poll);
        assert!(matches!(result, Err(ClientError::Timeout { polls: 3, .. })));

        let client = JobClient::with_config(
            Arc::new(MockTransport::with_service(service.clone())),
            JobClientConfig {
                poll,
                ..JobClientConfig::default()
            },
        );
        assert_eq!(client.await_completion(Some(&job_id)), JobStatus::error());
    }

    #[test]
    fn test_default_headers_applied() {
        let transport = MockTransport::new();
        let service = transport.service().clone();
        let client = JobClient::with_config(
            Arc::new(transport),
            JobClientConfig {
                defaults: RequestOptions {
                    token: Some("tok-1".to_string()),
                    use_cache: Some(true),
                    reuse_cached_jobid: None,
                },
                poll: PollConfig::immediate(),
            },
        );

        let mut params = static_params(&service);
        params.options.use_cache = Some(false);
        client.submit_static(&params).unwrap();

        let request = service.requests().pop().unwrap();
        assert_eq!(request.header("Authorization"), Some("Bearer tok-1"));
        assert_eq!(request.header("X-API-Cache"), Some("0"));
        assert_eq!(request.header("X-API-Reuse-Cached-JobId"), None);
    }

    #[test]
    fn test_http_error_carries_body() {
        let (client, service) = create_client();
        service.inject("staticgp", FailureConfig::http(503, "maintenance"));

        let err = client.submit_static(&static_params(&service)).unwrap_err();
        match err {
            ClientError::Http { status, ref body, endpoint } => {
                assert_eq!(status, 503);
                assert_eq!(endpoint, "staticgp");
                assert!(body.contains("maintenance"));
            }
            ref other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), 30);
    }

    #[test]
    fn test_error_mapping() {
        let err = ClientError::Transport(TransportError::Timeout);
        assert_eq!(err.failure_kind(), FailureKind::Transport);
        assert_eq!(err.exit_code(), 20);

        let err = ClientError::Timeout {
            job_id: "j".to_string(),
            polls: 1,
            elapsed: Duration::ZERO,
        };
        assert_eq!(err.exit_code(), 60);
        assert_eq!(FailureKind::JobFailed.exit_code(), 50);
    }
}
