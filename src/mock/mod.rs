//! Mock PCATS Service
//!
//! An in-process implementation of the PCATS REST contract for tests and
//! offline use. `MockTransport` routes client requests straight into it.
//!
//! # Endpoints
//!
//! - `staticgp` / `dynamicgp`: validate the form, assign a UUID job id
//! - `uploadfile`: store the file, answer with a file reference
//! - `status`: advance the job one step along its status progression
//! - `print` / `printCATE` / `results`: summaries of finished jobs
//! - `staticgp.cate` / `dynamicgp.cate`: derive a CATE job from a finished one
//! - `plot`: base URL of the job's plots
//!
//! Failures can be injected per endpoint name.

mod failure;
mod service;
mod state;

pub use failure::{FailureConfig, FailureInjector, FailureMode};
pub use service::{MockService, MOCK_PLOT_BASE};
pub use state::{JobKind, MockJob, MockState, StoredUpload};
