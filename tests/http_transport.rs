//! HTTP Transport Tests
//!
//! Drives the reqwest transport against a local mockito server, checking
//! what actually goes over the wire: paths, headers, multipart parts, and
//! how status codes map onto client errors.

use std::io::Write;
use std::time::Duration;

use mockito::{Matcher, Server};
use pcats_client::host::{ClientError, HttpConfig, JobClient, JobClientConfig, PollConfig};
use pcats_client::protocol::{CateParams, DataSource, JobId, JobStatus, RequestOptions, StaticParams};
use serde_json::json;
use tempfile::TempDir;

fn connect(server: &Server, defaults: RequestOptions) -> JobClient {
    let http = HttpConfig {
        base_url: server.url(),
        connect_timeout: Duration::from_secs(5),
        request_timeout: Some(Duration::from_secs(10)),
    };
    let config = JobClientConfig {
        defaults,
        poll: PollConfig::immediate().with_max_polls(5),
    };
    JobClient::connect(http, config).unwrap()
}

/// A text part named `name` whose value is exactly `value`
fn text_part(name: &str, value: &str) -> Matcher {
    Matcher::Regex(format!(
        "name=\"{}\"\r\n\r\n{}\r\n",
        regex_escape(name),
        regex_escape(value)
    ))
}

fn regex_escape(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            let special = "\\.+*?()|[]{}^$".contains(c);
            special.then_some('\\').into_iter().chain(std::iter::once(c))
        })
        .collect()
}

// =============================================================================
// Submissions
// =============================================================================

#[test]
fn test_fileref_submission_sends_text_part_and_headers() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/staticgp")
        .match_header("authorization", "Bearer t-1")
        .match_header("x-api-cache", "1")
        .match_header("x-api-reuse-cached-jobid", Matcher::Missing)
        .match_header("content-type", Matcher::Regex("^multipart/form-data; boundary=".into()))
        .match_body(Matcher::AllOf(vec![
            text_part("data", "file-abc"),
            text_part("outcome", "Y"),
            text_part("treatment", "A"),
            text_part("method", "BART"),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"jobid": ["abc-1"]}).to_string())
        .create();

    let client = connect(
        &server,
        RequestOptions {
            token: Some("t-1".to_string()),
            use_cache: Some(true),
            reuse_cached_jobid: None,
        },
    );
    let job_id = client
        .submit_static(&StaticParams::new(DataSource::fileref("file-abc"), "Y", "A"))
        .unwrap();

    assert_eq!(job_id.as_str(), "abc-1");
    mock.assert();
}

#[test]
fn test_local_file_sent_as_file_part() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("obs.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "Y,A\n1.5,0\n").unwrap();

    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/staticgp")
        .match_header("authorization", Matcher::Missing)
        .match_header("x-api-cache", Matcher::Missing)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("name=\"data\"; filename=\"obs\\.csv\"".into()),
            Matcher::Regex("\r\n\r\nY,A\n1\\.5,0\n\r\n".into()),
            text_part("outcome", "Y"),
        ]))
        .with_status(200)
        .with_body(r#"{"jobid": "abc-2"}"#)
        .create();

    let client = connect(&server, RequestOptions::default());
    let job_id = client
        .submit_static(&StaticParams::new(DataSource::file(&path), "Y", "A"))
        .unwrap();

    assert_eq!(job_id.as_str(), "abc-2");
    mock.assert();
}

#[test]
fn test_server_error_maps_to_http_error() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/staticgp")
        .with_status(500)
        .with_body(r#"{"error": ["R process crashed"]}"#)
        .create();

    let client = connect(&server, RequestOptions::default());
    let err = client
        .submit_static(&StaticParams::new(DataSource::fileref("file-abc"), "Y", "A"))
        .unwrap_err();

    match err {
        ClientError::Http { endpoint, status, ref body } => {
            assert_eq!(endpoint, "staticgp");
            assert_eq!(status, 500);
            assert!(body.contains("R process crashed"));
        }
        ref other => panic!("expected HTTP error, got {other}"),
    }
    assert_eq!(err.exit_code(), 30);
    mock.assert();
}

#[test]
fn test_only_200_counts_as_success() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/api/staticgp")
        .with_status(201)
        .with_body(json!({"jobid": ["abc-3"]}).to_string())
        .create();

    let client = connect(&server, RequestOptions::default());
    let err = client
        .submit_static(&StaticParams::new(DataSource::fileref("file-abc"), "Y", "A"))
        .unwrap_err();

    assert!(matches!(err, ClientError::Http { status: 201, .. }));
}

#[test]
fn test_200_without_jobid_is_protocol_error() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/api/staticgp")
        .with_status(200)
        .with_body(r#"{"error": ["queue full"]}"#)
        .create();

    let client = connect(&server, RequestOptions::default());
    let err = client
        .submit_static(&StaticParams::new(DataSource::fileref("file-abc"), "Y", "A"))
        .unwrap_err();

    assert!(matches!(err, ClientError::Protocol(_)));
}

#[test]
fn test_cate_submission_path() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/job/abc-1/staticgp.cate")
        .match_body(Matcher::AllOf(vec![
            text_part("x", "age"),
            text_part("control.tr", "0"),
            text_part("treat.tr", "1"),
        ]))
        .with_status(200)
        .with_body(r#"{"jobid": ["cate-1"]}"#)
        .create();

    let client = connect(&server, RequestOptions::default());
    let parent = JobId::new("abc-1").unwrap();
    let cate = client
        .submit_static_cate(&parent, &CateParams::new("age", "0", "1"))
        .unwrap();

    assert_eq!(cate.as_str(), "cate-1");
    mock.assert();
}

// =============================================================================
// Uploads
// =============================================================================

#[test]
fn test_upload_sends_file_part() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("panel.csv");
    std::fs::write(&path, "Y1,A1\n").unwrap();

    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/uploadfile")
        .match_body(Matcher::Regex("name=\"file\"; filename=\"panel\\.csv\"".into()))
        .with_status(200)
        .with_body(r#"{"fileref": ["file-77"]}"#)
        .create();

    let client = connect(&server, RequestOptions::default());
    assert_eq!(client.upload_file(&path).unwrap(), "file-77");
    mock.assert();
}

// =============================================================================
// Status and results
// =============================================================================

#[test]
fn test_wait_polls_status_endpoint() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/job/abc-1/status")
        .match_header("authorization", "Bearer t-2")
        .with_status(200)
        .with_body(r#"{"status": ["Done"]}"#)
        .expect(2)
        .create();

    let client = connect(
        &server,
        RequestOptions {
            token: Some("t-2".to_string()),
            ..RequestOptions::default()
        },
    );
    let job_id = JobId::new("abc-1").unwrap();

    assert_eq!(client.poll_status(Some(&job_id)), JobStatus::Done);
    assert_eq!(client.await_completion(Some(&job_id)), JobStatus::Done);
    mock.assert();
}

#[test]
fn test_status_not_found_fails_closed() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/api/job/gone/status")
        .with_status(404)
        .with_body(r#"{"error": ["job gone not found"]}"#)
        .create();

    let client = connect(&server, RequestOptions::default());
    let job_id = JobId::new("gone").unwrap();

    assert_eq!(client.poll_status(Some(&job_id)), JobStatus::error());
    assert!(matches!(
        client.status(&job_id),
        Err(ClientError::Http { status: 404, .. })
    ));
}

#[test]
fn test_print_and_plot_url() {
    let mut server = Server::new();
    let _print = server
        .mock("GET", "/api/job/abc-1/print")
        .with_status(200)
        .with_body("Average treatment effect: 0.42\n")
        .create();
    let _plot = server
        .mock("GET", "/api/job/abc-1/plot")
        .with_status(200)
        .with_body(r#"{"url": ["https://plots.example/abc-1/"]}"#)
        .create();

    let client = connect(&server, RequestOptions::default());
    let job_id = JobId::new("abc-1").unwrap();

    assert_eq!(client.print(&job_id).unwrap(), "Average treatment effect: 0.42\n");
    assert_eq!(
        client.plot_url(&job_id, Some("cate")).unwrap(),
        "https://plots.example/abc-1/cate"
    );
}

#[test]
fn test_unreachable_service_is_transport_error() {
    // Nothing listens on a port that was just released
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = JobClient::connect(
        HttpConfig {
            base_url: url,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Some(Duration::from_secs(2)),
        },
        JobClientConfig::default(),
    )
    .unwrap();
    let job_id = JobId::new("abc-1").unwrap();

    let err = client.status(&job_id).unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(err.exit_code(), 20);
    assert_eq!(client.poll_status(Some(&job_id)), JobStatus::error());
}
