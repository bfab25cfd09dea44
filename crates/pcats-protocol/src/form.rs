//! Multipart form model and per-endpoint field schemas.
//!
//! Parameter structures serialize into a [`MultipartForm`], which is checked
//! against the endpoint's [`FieldSchema`] before any transport sees it. A
//! misspelled field name therefore fails locally instead of being silently
//! ignored by the service.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::ProtocolError;
use crate::params::DataSource;

/// Value of a single multipart field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain text part
    Text(String),
    /// Raw file content, read from this path when the request is sent
    File(PathBuf),
    /// Reference to a previously uploaded file, sent as text
    FileRef(String),
}

impl FieldValue {
    /// Text representation for parts that are not file uploads.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::FileRef(s) => Some(s),
            FieldValue::File(_) => None,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) | FieldValue::FileRef(s) => s.trim().is_empty(),
            FieldValue::File(p) => p.as_os_str().is_empty(),
        }
    }
}

impl From<&DataSource> for FieldValue {
    fn from(source: &DataSource) -> Self {
        match source {
            DataSource::File(path) => FieldValue::File(path.clone()),
            DataSource::FileRef(fileref) => FieldValue::FileRef(fileref.clone()),
        }
    }
}

/// Ordered multipart form body. Absent values are never added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    fields: Vec<(String, FieldValue)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields
            .push((name.into(), FieldValue::Text(value.to_string())));
        self
    }

    /// Add a text field only when a value is present.
    pub fn opt_text<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    /// Add a data field, either as file content or as a file reference.
    pub fn data(mut self, name: impl Into<String>, source: &DataSource) -> Self {
        self.fields.push((name.into(), FieldValue::from(source)));
        self
    }

    /// Add a data field only when a source is present.
    pub fn opt_data(self, name: impl Into<String>, source: Option<&DataSource>) -> Self {
        match source {
            Some(s) => self.data(name, s),
            None => self,
        }
    }

    /// Add a raw file part.
    pub fn file(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.fields.push((name.into(), FieldValue::File(path.into())));
        self
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// First value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Text of the field called `name`, when it is a text or reference part.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check this form against an endpoint schema.
    pub fn validate(&self, schema: &FieldSchema) -> Result<(), ProtocolError> {
        let mut seen = HashSet::new();
        for (name, _) in &self.fields {
            if !schema.declares(name) {
                return Err(ProtocolError::UnknownField {
                    endpoint: schema.endpoint.to_string(),
                    field: name.clone(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(ProtocolError::DuplicateField {
                    endpoint: schema.endpoint.to_string(),
                    field: name.clone(),
                });
            }
        }

        for required in schema.required {
            let present = self.get(required).is_some_and(|v| !v.is_blank());
            if !present {
                return Err(ProtocolError::MissingRequired {
                    endpoint: schema.endpoint.to_string(),
                    field: required.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Declared field names of one endpoint.
#[derive(Debug)]
pub struct FieldSchema {
    /// Endpoint name for error messages
    pub endpoint: &'static str,
    /// Field names accepted as-is
    pub fields: &'static [&'static str],
    /// Namespaces under which every `stage_fields` entry is accepted
    pub stage_prefixes: &'static [&'static str],
    /// Field names valid under each stage prefix
    pub stage_fields: &'static [&'static str],
    /// Fields that must be present and non-empty
    pub required: &'static [&'static str],
}

impl FieldSchema {
    pub fn declares(&self, name: &str) -> bool {
        if self.fields.contains(&name) {
            return true;
        }
        self.stage_prefixes.iter().any(|prefix| {
            name.strip_prefix(prefix)
                .is_some_and(|rest| self.stage_fields.contains(&rest))
        })
    }
}

pub static STATIC_SCHEMA: FieldSchema = FieldSchema {
    endpoint: "staticgp",
    fields: &[
        "data",
        "outcome",
        "treatment",
        "x.explanatory",
        "x.confounding",
        "tr.hte",
        "tr2.values",
        "burn.num",
        "mcmc.num",
        "outcome.lb",
        "outcome.ub",
        "outcome.bound_censor",
        "outcome.censor.yn",
        "outcome.censor.lv",
        "outcome.censor.uv",
        "outcome.type",
        "outcome.link",
        "pr.values",
        "tr.type",
        "tr2.type",
        "method",
        "x.categorical",
        "seed",
        "mi.data",
    ],
    stage_prefixes: &[],
    stage_fields: &[],
    required: &["data", "outcome", "treatment"],
};

pub static DYNAMIC_SCHEMA: FieldSchema = FieldSchema {
    endpoint: "dynamicgp",
    fields: &[
        "data",
        "burn.num",
        "mcmc.num",
        "x.categorical",
        "method",
        "seed",
        "mi.data",
    ],
    stage_prefixes: &["stg1.", "stg2."],
    stage_fields: &[
        "outcome",
        "treatment",
        "x.explanatory",
        "x.confounding",
        "tr.hte",
        "tr.values",
        "outcome.lb",
        "outcome.ub",
        "outcome.bound_censor",
        "outcome.censor.yn",
        "outcome.censor.lv",
        "outcome.censor.uv",
        "outcome.link",
        "outcome.type",
        "tr.type",
        "pr.values",
    ],
    required: &[
        "data",
        "stg1.outcome",
        "stg1.treatment",
        "stg2.outcome",
        "stg2.treatment",
    ],
};

pub static CATE_SCHEMA: FieldSchema = FieldSchema {
    endpoint: "cate",
    fields: &["x", "control.tr", "treat.tr", "pr.values"],
    stage_prefixes: &[],
    stage_fields: &[],
    required: &["x", "control.tr", "treat.tr"],
};

pub static UPLOAD_SCHEMA: FieldSchema = FieldSchema {
    endpoint: "uploadfile",
    fields: &["file"],
    stage_prefixes: &[],
    stage_fields: &[],
    required: &["file"],
};
