//! Typed errors surfaced by the library modules
//!
//! Command handlers work with `anyhow::Result` and convert these with `?`;
//! tests match on the variants directly.

use thiserror::Error;

/// Invalid range or paging arguments, detected before any network activity
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("--range-start must be at least 1 (got {0})")]
    StartBelowOne(i64),
    #[error("--list-all cannot be combined with --range-start or --range-end")]
    ListAllWithRange,
    #[error("--range-end ({end}) must be greater than --range-start ({start}) or 0 for the end of the data")]
    EndNotAfterStart { start: i64, end: i64 },
    #[error("page size must be greater than zero (got {0})")]
    InvalidPageSize(i64),
}

/// Failures while building input records from flags, prompts or files
#[derive(Debug, Error)]
pub enum InputError {
    #[error("CSV input {path} has no header row")]
    MissingHeader { path: String },
    #[error("CSV input {path} row {row}: expected {expected} columns, found {found}")]
    ColumnMismatch {
        path: String,
        row: u64,
        expected: usize,
        found: usize,
    },
    #[error("JSON input {path} must contain a single top-level array")]
    NotAnArray { path: String },
    #[error("JSON input {path} element {index} is not an object")]
    NotAnObject { path: String, index: usize },
    #[error("unsupported input format `{0}` (expected json or csv)")]
    UnsupportedFormat(String),
    #[error("--from-file is not supported for single-object commands")]
    FileNotAllowed,
    #[error("invalid value `{value}` for field `{field}`: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("input ended while waiting for a value for `{0}`")]
    PromptEof(String),
    #[error("failed to read a value for `{field}`")]
    PromptRead {
        field: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read input file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse input file {path}")]
    Parse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Error responses and malformed payloads from the console API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {path} failed with status {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },
    #[error("listing response from {path} is missing `{field}`")]
    MalformedListing { path: String, field: &'static str },
}

/// Missing or unusable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a config directory for the current user")]
    MissingConfigDir,
    #[error("API key is required; set it with `consolectl configure --api-key <key>` or CONSOLECTL_API_KEY")]
    MissingApiKey,
    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),
}
