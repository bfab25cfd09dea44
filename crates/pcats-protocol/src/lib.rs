//! PCATS Protocol Types
//!
//! Defines the request/response contract of the PCATS REST API: endpoint
//! paths, the parameter tables of each analysis method, the multipart form
//! model those tables serialize into, and the JSON bodies the service answers
//! with.

pub mod endpoint;
pub mod error;
pub mod form;
pub mod params;
pub mod response;
pub mod status;

pub use endpoint::{Endpoint, JobId, Verb};
pub use error::ProtocolError;
pub use form::{FieldSchema, FieldValue, MultipartForm};
pub use params::{
    BoundCensor, CateParams, DataSource, DynamicParams, Method, OutcomeLink, OutcomeType,
    RequestOptions, StageParams, StaticParams, TreatmentType,
};
pub use response::{decode, FileRefBody, JobIdBody, PlotUrlBody, Scalar, StatusBody};
pub use status::{JobStatus, ERROR_TOKEN};

/// Base URL of the public PCATS deployment.
pub const DEFAULT_BASE_URL: &str = "https://pcats.research.cchmc.org";

/// Header carrying the "results may come from cache" directive.
pub const HEADER_USE_CACHE: &str = "X-API-Cache";

/// Header carrying the "a cached job id may be returned" directive.
pub const HEADER_REUSE_CACHED_JOBID: &str = "X-API-Reuse-Cached-JobId";
