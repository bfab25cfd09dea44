//! Client-Side Components
//!
//! The job client, the transports it talks through and the status poll loop.

pub mod client;
pub mod poll;
pub mod transport;

pub use client::{ClientError, ClientResult, FailureKind, JobClient, JobClientConfig};
pub use poll::{PollBudget, PollConfig, PollValidationError, DEFAULT_POLL_INTERVAL};
pub use transport::{
    HttpConfig, HttpRequest, HttpResponse, HttpTransport, MockTransport, Transport, TransportError,
};
