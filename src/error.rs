use crate::entity::NaturalKey;
use polars::prelude::PolarsError;
use std::{io, path};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HetnetError>;

#[derive(Debug, Error)]
pub enum HetnetError {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: path::PathBuf },

    #[error("malformed record #{index} in {context}: missing `{field}`")]
    MalformedRecord { context: String, index: usize, field: &'static str },

    #[error("ambiguous reference to {key}: {matches} matching entities (expected exactly 1)")]
    AmbiguousReference { key: NaturalKey, matches: usize },

    #[error("unresolvable row #{row} in {dataset}: {reason}")]
    UnresolvableRow { dataset: &'static str, row: usize, reason: String },

    #[error("unrecognized {vocabulary} value: {value:?}")]
    UnrecognizedEnum { vocabulary: &'static str, value: String },

    #[error("graph invariant violated: expected {expected} {what}, found {actual}")]
    GraphInvariant { what: &'static str, expected: usize, actual: usize },

    #[error("relation references unknown entity id {0}")]
    UnknownEntity(usize),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Yaml(#[from] serde_yml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl HetnetError {
    pub fn unrecognized(vocabulary: &'static str, value: impl Into<String>) -> Self {
        HetnetError::UnrecognizedEnum { vocabulary, value: value.into() }
    }

    /// True for errors that a batch may skip over and count rather than abort on.
    pub fn is_row_level(&self) -> bool {
        matches!(self, HetnetError::AmbiguousReference { .. } | HetnetError::UnresolvableRow { .. })
    }
}
