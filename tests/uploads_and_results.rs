//! Upload, Caching and Result Retrieval Tests
//!
//! File uploads and file reference reuse, cache headers, and the print,
//! results and plot endpoints of finished jobs.

use std::io::Write;
use std::sync::Arc;

use pcats_client::host::{ClientError, JobClient, JobClientConfig, MockTransport, PollConfig, TransportError};
use pcats_client::mock::{FailureConfig, MockService, MOCK_PLOT_BASE};
use pcats_client::protocol::{
    DataSource, FieldValue, JobStatus, ProtocolError, RequestOptions, StaticParams,
};
use tempfile::NamedTempFile;

fn setup() -> (JobClient, MockService) {
    setup_with_defaults(RequestOptions::default())
}

fn setup_with_defaults(defaults: RequestOptions) -> (JobClient, MockService) {
    let service = MockService::new();
    let transport = MockTransport::with_service(service.clone());
    let config = JobClientConfig {
        defaults,
        poll: PollConfig::immediate(),
    };
    (JobClient::with_config(Arc::new(transport), config), service)
}

fn data_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

// =============================================================================
// Uploads
// =============================================================================

#[test]
fn test_upload_returns_reference_usable_in_submission() {
    let (client, service) = setup();
    let file = data_file("Y,A\n1,0\n2,1\n");

    let fileref = client.upload_file(file.path()).unwrap();
    assert!(!fileref.is_empty());
    assert_eq!(service.upload_content(&fileref).unwrap(), b"Y,A\n1,0\n2,1\n");

    let params = StaticParams::new(DataSource::fileref(fileref.clone()), "Y", "A");
    let job_id = client.submit_static(&params).unwrap();
    assert_eq!(service.job(&job_id).unwrap().field("data"), Some(fileref.as_str()));

    // Sent as a plain text part, not a file
    let request = service.requests().pop().unwrap();
    assert_eq!(
        request.form.unwrap().get("data"),
        Some(&FieldValue::FileRef(fileref))
    );
}

#[test]
fn test_submission_with_local_file() {
    let (client, service) = setup();
    let file = data_file("Y,A\n1,0\n");

    let params = StaticParams::new(DataSource::file(file.path()), "Y", "A")
        .with_mi_data(DataSource::file(file.path()));
    let job_id = client.submit_static(&params).unwrap();

    let job = service.job(&job_id).unwrap();
    let stored = job.field("data").unwrap();
    assert_eq!(service.upload_content(stored).unwrap(), b"Y,A\n1,0\n");
    assert!(job.field("mi.data").is_some());
}

#[test]
fn test_upload_missing_file_is_transport_error() {
    let (client, _service) = setup();

    let err = client
        .upload_file(std::path::Path::new("/nonexistent/pcats/obs.csv"))
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(TransportError::Io(_))));
}

#[test]
fn test_upload_without_fileref_in_answer() {
    let (client, service) = setup();
    service.inject("uploadfile", FailureConfig::http(200, r#"{"fileref": [""]}"#));
    let file = data_file("x");

    let err = client.upload_file(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::MissingResponseField("fileref"))
    ));
}

// =============================================================================
// Cache headers
// =============================================================================

#[test]
fn test_cached_job_id_reused_when_both_flags_set() {
    let (client, service) = setup_with_defaults(RequestOptions {
        token: None,
        use_cache: Some(true),
        reuse_cached_jobid: Some(true),
    });
    let file = data_file("Y,A\n1,0\n");
    let params = StaticParams::new(DataSource::file(file.path()), "Y", "A");

    let first = client.submit_static(&params).unwrap();
    let second = client.submit_static(&params).unwrap();
    assert_eq!(first, second);
    assert_eq!(service.job_count(), 1);

    let mut fresh = params.clone();
    fresh.options.reuse_cached_jobid = Some(false);
    let third = client.submit_static(&fresh).unwrap();
    assert_ne!(first, third);

    let request = service.requests().pop().unwrap();
    assert_eq!(request.header("X-API-Cache"), Some("1"));
    assert_eq!(request.header("X-API-Reuse-Cached-JobId"), Some("0"));
}

#[test]
fn test_no_cache_headers_by_default() {
    let (client, service) = setup();
    let file = data_file("Y,A\n");

    client
        .submit_static(&StaticParams::new(DataSource::file(file.path()), "Y", "A"))
        .unwrap();

    let request = service.requests().pop().unwrap();
    assert!(request.header("X-API-Cache").is_none());
    assert!(request.header("X-API-Reuse-Cached-JobId").is_none());
    assert!(request.header("Authorization").is_none());
}

#[test]
fn test_token_sent_on_every_request() {
    let (client, service) = setup_with_defaults(RequestOptions {
        token: Some("abc".to_string()),
        ..RequestOptions::default()
    });
    service.require_token("abc");
    let file = data_file("Y,A\n");

    let job_id = client
        .submit_static(&StaticParams::new(DataSource::file(file.path()), "Y", "A"))
        .unwrap();
    assert_eq!(client.await_completion(Some(&job_id)), JobStatus::Done);
    client.results(&job_id).unwrap();

    assert!(service
        .requests()
        .iter()
        .all(|r| r.header("Authorization") == Some("Bearer abc")));
}

#[test]
fn test_missing_token_rejected() {
    let (client, service) = setup();
    service.require_token("abc");
    let file = data_file("Y,A\n");

    let err = client
        .submit_static(&StaticParams::new(DataSource::file(file.path()), "Y", "A"))
        .unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 401, .. }));
}

// =============================================================================
// Results
// =============================================================================

fn finished_job(client: &JobClient, service: &MockService) -> pcats_client::protocol::JobId {
    let fileref = service.store_upload("obs.csv", b"Y,A\n".to_vec());
    let job_id = client
        .submit_static(&StaticParams::new(DataSource::fileref(fileref), "Y", "A"))
        .unwrap();
    assert_eq!(client.await_completion(Some(&job_id)), JobStatus::Done);
    job_id
}

#[test]
fn test_print_and_results() {
    let (client, service) = setup();
    let job_id = finished_job(&client, &service);

    let summary = client.print(&job_id).unwrap();
    assert!(summary.contains(job_id.as_str()));
    assert!(summary.contains("outcome: Y"));

    let results: serde_json::Value = serde_json::from_str(&client.results(&job_id).unwrap()).unwrap();
    assert_eq!(results["jobid"][0], job_id.as_str());
}

#[test]
fn test_print_of_unfinished_job_is_http_error() {
    let (client, service) = setup();
    let fileref = service.store_upload("obs.csv", b"Y,A\n".to_vec());
    let job_id = client
        .submit_static(&StaticParams::new(DataSource::fileref(fileref), "Y", "A"))
        .unwrap();

    assert!(matches!(
        client.print(&job_id),
        Err(ClientError::Http { status: 400, .. })
    ));
}

#[test]
fn test_non_utf8_text_maps_to_protocol_failure() {
    let err: ClientError = String::from_utf8(vec![0xff, 0xfe]).unwrap_err().into();
    assert!(matches!(err, ClientError::Decode(_)));
    assert_eq!(err.exit_code(), 40);
}

#[test]
fn test_plot_url_with_type() {
    let (client, service) = setup();
    let job_id = finished_job(&client, &service);

    let base = client.plot_url(&job_id, None).unwrap();
    assert_eq!(base, format!("{}/{}", MOCK_PLOT_BASE, job_id));

    let cate = client.plot_url(&job_id, Some("cate")).unwrap();
    assert!(cate.ends_with("/cate"));
    assert_eq!(cate, format!("{}/cate", base));
}

#[test]
fn test_plot_url_unknown_job() {
    let (client, _service) = setup();
    let job_id = pcats_client::protocol::JobId::new("ghost").unwrap();

    assert!(matches!(
        client.plot_url(&job_id, Some("cate")),
        Err(ClientError::Http { status: 404, .. })
    ));
}
