//! `Dialogue:` event parsing
//!
//! Each chat message is one `Dialogue:` line in the `[Events]` section:
//!
//! ```text
//! Dialogue: 0,0:01:02.50,0:01:10.50,Danmu,Alice (12345),0,0,0,,{\move(...)}hello
//! ```
//!
//! Fields are comma separated, but the final text field may itself contain
//! commas, so the line is split into at most ten fields.

use crate::ass::scanner::{SectionTracker, EVENTS};
use crate::error::Result;
use crate::timing::timestamp_to_seconds;
use serde::Serialize;
use std::io::BufRead;
use tracing::{debug, warn};

/// Prefix of an event line
pub const DIALOGUE_PREFIX: &str = "Dialogue:";

/// Number of comma-separated fields in an event line; the last absorbs the rest
pub const EVENT_FIELD_COUNT: usize = 10;

const START_FIELD: usize = 1;
const NAME_FIELD: usize = 4;
const TEXT_FIELD: usize = 9;

/// One chat message parsed from an event line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRecord {
    /// Seconds since the recording started
    pub offset_seconds: f64,
    /// Display name at the time of the message
    pub sender_name: String,
    /// Stable numeric identity; 0 means anonymous
    pub sender_id: i64,
    /// Message body with format tags removed
    pub text: String,
}

impl ChatRecord {
    /// Anonymous messages parse fine but are never stored
    pub fn is_persistable(&self) -> bool {
        self.sender_id != 0
    }
}

/// Why an event line was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer than ten fields
    TooFewFields { line: usize },
    /// Start field is not `H:MM:SS.cc` / `MM:SS.cc`
    BadTimestamp { line: usize, value: String },
}

/// Output of a full parse: records in file order plus what was skipped
#[derive(Debug, Default)]
pub struct ParsedEvents {
    pub records: Vec<ChatRecord>,
    pub skipped: Vec<SkipReason>,
}

/// Split a `"Name (12345)"` identity into display name and numeric id
///
/// Without a trailing parenthesised number (or with nothing in front of it) the
/// whole trimmed string is the name and the id is 0. A number too large for an
/// id keeps the name and yields id 0.
pub fn parse_identity(raw: &str) -> (String, i64) {
    let trimmed = raw.trim();
    match split_identity_suffix(trimmed) {
        Some((name, id)) => (name.to_string(), id),
        None => (trimmed.to_string(), 0),
    }
}

fn split_identity_suffix(s: &str) -> Option<(&str, i64)> {
    let body = s.strip_suffix(')')?;
    let open = body.rfind('(')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let name = &body[..open];
    if name.is_empty() {
        return None;
    }
    let id = digits.parse::<i64>().unwrap_or(0);
    Some((name.trim(), id))
}

/// Remove every `{\...}` override block, then trim
///
/// Blocks do not nest; an unterminated `{\` is kept as text. Stripping repeats
/// until nothing changes, so applying this twice equals applying it once.
pub fn strip_format_tags(raw: &str) -> String {
    let mut current = strip_once(raw);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current.trim().to_string();
        }
        current = next;
    }
}

fn strip_once(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("{\\") {
        match rest[start..].find('}') {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + len + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Parse one trimmed `Dialogue:` line
///
/// `Ok(None)` means the line has too few fields; `Err` means the start field
/// is malformed.
pub fn parse_dialogue_line(line: &str) -> Result<Option<ChatRecord>> {
    let fields: Vec<&str> = line.splitn(EVENT_FIELD_COUNT, ',').collect();
    if fields.len() < EVENT_FIELD_COUNT {
        return Ok(None);
    }

    let offset_seconds = timestamp_to_seconds(fields[START_FIELD])?;
    let (sender_name, sender_id) = parse_identity(fields[NAME_FIELD]);
    let text = strip_format_tags(fields[TEXT_FIELD]);

    Ok(Some(ChatRecord {
        offset_seconds,
        sender_name,
        sender_id,
        text,
    }))
}

/// Parse every event line in the `[Events]` section
///
/// Parsing stops at the header after `[Events]`. Bad lines are skipped and
/// reported; they never fail the parse.
pub fn parse_events<R: BufRead>(reader: R) -> Result<ParsedEvents> {
    let mut parsed = ParsedEvents::default();
    let mut tracker = SectionTracker::new();
    let mut seen_events = false;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;

        if tracker.advance(&line) {
            if seen_events {
                break;
            }
            seen_events = tracker.in_section(EVENTS);
            continue;
        }
        if !seen_events {
            continue;
        }

        let line = line.trim();
        if !line.starts_with(DIALOGUE_PREFIX) {
            continue;
        }

        match parse_dialogue_line(line) {
            Ok(Some(record)) => parsed.records.push(record),
            Ok(None) => {
                debug!("Line {}: too few fields, skipped", line_no);
                parsed.skipped.push(SkipReason::TooFewFields { line: line_no });
            }
            Err(e) => {
                warn!("Line {}: skipping event, {}", line_no, e);
                parsed.skipped.push(SkipReason::BadTimestamp {
                    line: line_no,
                    value: line
                        .splitn(EVENT_FIELD_COUNT, ',')
                        .nth(START_FIELD)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }
    }

    Ok(parsed)
}
