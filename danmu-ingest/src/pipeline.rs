//! End-to-end import of one chat recording
//!
//! scan (live id) -> parse events -> resolve start time -> write

use crate::ass::event::{parse_events, ParsedEvents, SkipReason};
use crate::ass::scanner::read_live_id;
use crate::error::{Error, Result};
use crate::store::ChatStore;
use crate::timing::{BaseTimeResolver, CommentStartTime, StoreStartTime};
use crate::writer::{write_chat, IdentityStats};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Final state of one file's import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Rows written and committed
    Persisted,
    /// The file has no chat events; the database was not touched
    NothingToPersist,
    /// Parsed only, by request
    DryRun,
}

/// Structured outcome of importing one file
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub path: PathBuf,
    pub live_id: String,
    pub status: IngestStatus,
    /// Event lines parsed into records
    pub parsed: usize,
    /// Records with a sender id
    pub eligible: usize,
    /// Rows committed
    pub persisted: usize,
    /// Row inserts that failed and were skipped
    pub failed_rows: usize,
    /// Rows replaced from an earlier import of the same live
    pub purged: u64,
    pub identities: IdentityStats,
    pub base_time: Option<DateTime<FixedOffset>>,
    pub base_time_source: Option<&'static str>,
    /// Event lines that could not be parsed
    pub skipped: Vec<SkipReason>,
}

impl IngestReport {
    fn new(path: &Path, live_id: String, events: &ParsedEvents, status: IngestStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            live_id,
            status,
            parsed: events.records.len(),
            eligible: events.records.iter().filter(|r| r.is_persistable()).count(),
            persisted: 0,
            failed_rows: 0,
            purged: 0,
            identities: IdentityStats::default(),
            base_time: None,
            base_time_source: None,
            skipped: events.skipped.clone(),
        }
    }
}

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Leading lines searched for `LiveStartTime`
    pub start_time_scan_lines: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            start_time_scan_lines: 50,
        }
    }
}

/// Live id and parsed events of a recording
#[derive(Debug)]
pub struct ScannedFile {
    pub live_id: String,
    pub events: ParsedEvents,
}

/// Read the live id and every chat event from `path`
pub fn scan_file(path: &Path) -> Result<ScannedFile> {
    let live_id = read_live_id(path)?.ok_or_else(|| Error::MissingLiveId(path.to_path_buf()))?;
    let events = parse_events(BufReader::new(File::open(path)?))?;

    info!(
        "Parsed {} chat events from {} (live {}, {} lines skipped)",
        events.records.len(),
        path.display(),
        live_id,
        events.skipped.len()
    );

    Ok(ScannedFile { live_id, events })
}

/// Parse `path` without touching any database
pub fn dry_run(path: &Path) -> Result<IngestReport> {
    let scanned = scan_file(path)?;
    Ok(IngestReport::new(
        path,
        scanned.live_id,
        &scanned.events,
        IngestStatus::DryRun,
    ))
}

/// Import `path` into `store`
///
/// The start time comes from the store when it has a record for the live,
/// otherwise from the file's `LiveStartTime` comment. If neither exists
/// nothing is written.
pub async fn ingest_file<S: ChatStore>(
    store: &S,
    path: &Path,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let scanned = scan_file(path)?;
    let mut report = IngestReport::new(
        path,
        scanned.live_id.clone(),
        &scanned.events,
        IngestStatus::NothingToPersist,
    );

    if scanned.events.records.is_empty() {
        warn!("No chat events in {}, nothing to write", path.display());
        return Ok(report);
    }

    let resolver = BaseTimeResolver::new()
        .with_source(StoreStartTime::new(store))
        .with_source(CommentStartTime::new(
            path,
            options.start_time_scan_lines,
            store.civil_offset(),
        ));
    debug!(
        "Start time sources for live {}: {:?}",
        scanned.live_id,
        resolver.source_names()
    );
    let base = resolver.resolve(&scanned.live_id).await?;

    let summary = write_chat(store, &scanned.live_id, &scanned.events.records, base.at).await?;

    report.status = IngestStatus::Persisted;
    report.persisted = summary.inserted;
    report.failed_rows = summary.failed_rows;
    report.purged = summary.purged;
    report.identities = summary.identities;
    report.base_time = Some(base.at);
    report.base_time_source = Some(base.source);
    Ok(report)
}
