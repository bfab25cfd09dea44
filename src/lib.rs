//! PCATS client
//!
//! Client library for the PCATS causal-inference service. Submits
//! single-stage, two-stage and CATE analyses over HTTP, polls job status
//! and fetches printable and structured results.
//!
//! The wire contract lives in the `pcats-protocol` crate; this crate adds
//! the job client, its transports, layered configuration and an in-process
//! mock of the service.

pub mod config;
pub mod host;
pub mod mock;

pub use config::{ClientSettings, ConfigError, EffectiveConfig};
pub use host::{
    ClientError, ClientResult, FailureKind, HttpConfig, JobClient, JobClientConfig,
    MockTransport, PollConfig, Transport, TransportError,
};
pub use mock::MockService;
pub use pcats_protocol as protocol;
pub use pcats_protocol::{
    CateParams, DataSource, DynamicParams, JobId, JobStatus, RequestOptions, StageParams,
    StaticParams,
};
