//! Error taxonomy shared by the refresh pipelines and the cache layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or invalid setting (e.g. no market-data credential).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-success response, timeout or malformed payload from an external source.
    #[error("upstream error from {source_name}: {reason}")]
    Upstream { source_name: String, reason: String },

    /// An otherwise successful response lacks a record we cannot do without.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Cache document could not be read or written.
    #[error("persistence error on '{key}': {reason}")]
    Persistence { key: String, reason: String },
}

impl PipelineError {
    pub fn upstream(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Upstream {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Persistence {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Upstream { .. } => "upstream",
            Self::DataIntegrity(_) => "data_integrity",
            Self::Persistence { .. } => "persistence",
        }
    }
}
