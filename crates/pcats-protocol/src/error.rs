//! Error types for the PCATS protocol.

/// Contract violations detected before a request is sent or while reading a
/// response body.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A form field that the endpoint does not declare.
    #[error("{endpoint}: unknown field '{field}'")]
    UnknownField { endpoint: String, field: String },

    /// The same field name was added twice.
    #[error("{endpoint}: duplicate field '{field}'")]
    DuplicateField { endpoint: String, field: String },

    /// A required field is absent or empty.
    #[error("{endpoint}: missing required field '{field}'")]
    MissingRequired { endpoint: String, field: String },

    /// A job id was empty or could not be used as a path segment.
    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    /// The response body was not JSON.
    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// The response body lacked the expected field.
    #[error("response is missing field '{0}'")]
    MissingResponseField(&'static str),
}
