//! Line-level grammar for the subtitle container
//!
//! Sections are introduced by bracketed header lines (`[Script Info]`,
//! `[Events]`) and run until the next header or end of file. Metadata lives in
//! comment lines of the form `; Key: value`.

use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Metadata section name
pub const SCRIPT_INFO: &str = "Script Info";

/// Event section name
pub const EVENTS: &str = "Events";

/// Comment key carrying the live recording id
pub const LIVE_ID_KEY: &str = "LiveID";

/// Comment key carrying the recorded start time
pub const LIVE_START_TIME_KEY: &str = "LiveStartTime";

/// Name of a `[Name]` header line, if `line` is one
pub fn section_header(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
}

/// Value of a `; key: value` comment line, if `line` is one for `key`
///
/// Whitespace after `;`, around the colon, and at the end is ignored. An empty
/// value does not count as a match.
pub fn comment_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let value = line
        .trim()
        .strip_prefix(';')?
        .trim_start()
        .strip_prefix(key)?
        .trim_start()
        .strip_prefix(':')?
        .trim();
    (!value.is_empty()).then_some(value)
}

/// Tracks which section the cursor is in, one line at a time
#[derive(Debug, Default)]
pub struct SectionTracker {
    current: Option<String>,
}

impl SectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns true if it was a header (and moves into that section)
    pub fn advance(&mut self, line: &str) -> bool {
        match section_header(line) {
            Some(name) => {
                self.current = Some(name.to_string());
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn in_section(&self, name: &str) -> bool {
        self.current.as_deref() == Some(name)
    }
}

/// First `; key: value` comment inside `[Script Info]`
///
/// Scanning stops at the header following `[Script Info]`.
pub fn find_script_info_field<R: BufRead>(reader: R, key: &str) -> Result<Option<String>> {
    let mut tracker = SectionTracker::new();
    let mut seen_section = false;

    for line in reader.lines() {
        let line = line?;
        if tracker.advance(&line) {
            if seen_section {
                break;
            }
            seen_section = tracker.in_section(SCRIPT_INFO);
            continue;
        }
        if tracker.in_section(SCRIPT_INFO) {
            if let Some(value) = comment_field(&line, key) {
                return Ok(Some(value.to_string()));
            }
        }
    }

    Ok(None)
}

/// First `; key: value` comment within the first `max_lines` lines, any section
pub fn find_leading_comment<R: BufRead>(
    reader: R,
    key: &str,
    max_lines: usize,
) -> Result<Option<String>> {
    for line in reader.lines().take(max_lines) {
        let line = line?;
        if let Some(value) = comment_field(&line, key) {
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

/// Live recording id from the `LiveID` comment, first whitespace-delimited token
pub fn read_live_id(path: &Path) -> Result<Option<String>> {
    let reader = BufReader::new(File::open(path)?);
    let value = find_script_info_field(reader, LIVE_ID_KEY)?;
    Ok(value.and_then(|v| v.split_whitespace().next().map(str::to_string)))
}
