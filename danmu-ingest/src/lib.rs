//! danmu-ingest library - chat recording import
//!
//! Reads a live-chat recording in subtitle (ASS) form, resolves when the
//! stream started, and replaces the stored chat of that live in SQLite or
//! MySQL while keeping the sender registry current.

pub mod ass;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod timing;
pub mod writer;

pub use ass::event::ChatRecord;
pub use error::{Error, Result};
pub use pipeline::{dry_run, ingest_file, IngestOptions, IngestReport, IngestStatus};
