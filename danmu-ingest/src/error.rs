//! Error types for danmu-ingest
//!
//! Fatal errors end the run for one file. Per-line and per-row problems are
//! not errors at this level; they are logged and counted in the report.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for danmu-ingest
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database connection, transaction, or statement errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors from shared configuration / connection helpers
    #[error(transparent)]
    Common(#[from] danmu_common::Error),

    /// The `[Script Info]` section carries no `LiveID` comment
    #[error("No LiveID found in {0}")]
    MissingLiveId(PathBuf),

    /// Event timestamp is not `H:MM:SS.cc` or `MM:SS.cc`
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// `LiveStartTime` comment present but unparseable
    #[error("Invalid LiveStartTime: {0:?}")]
    InvalidStartTime(String),

    /// No start-time source produced a value
    #[error("Could not resolve start time for live {0}")]
    StartTimeUnresolved(String),
}

/// Convenience Result type using danmu-ingest Error
pub type Result<T> = std::result::Result<T, Error>;
