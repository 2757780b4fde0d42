//! Recording-relative offsets and absolute start-time resolution
//!
//! Event timestamps are offsets from the start of the recording. To place a
//! message in absolute time the recording's start must be known; it is looked
//! up through an ordered list of [`StartTimeSource`]s, first hit wins.

use crate::ass::scanner::{find_leading_comment, LIVE_START_TIME_KEY};
use crate::error::{Error, Result};
use crate::store::ChatStore;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{info, warn};

/// Accepted `LiveStartTime` layouts, tried in order
pub const START_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.3f", "%Y-%m-%d %H:%M:%S"];

/// Convert `H:MM:SS.cc` or `MM:SS.cc` into seconds
///
/// Hours and minutes are whole numbers; seconds may carry a fraction. A
/// missing hour component counts as zero.
pub fn timestamp_to_seconds(raw: &str) -> Result<f64> {
    let invalid = || Error::InvalidTimestamp(raw.to_string());
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => ("0", *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(invalid()),
    };

    let hours = parse_whole(hours).ok_or_else(invalid)?;
    let minutes = parse_whole(minutes).ok_or_else(invalid)?;
    let seconds = parse_seconds(seconds).ok_or_else(invalid)?;

    let whole = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .ok_or_else(invalid)?;

    Ok(whole as f64 + seconds)
}

fn parse_whole(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_seconds(s: &str) -> Option<f64> {
    let digits = s.bytes().filter(u8::is_ascii_digit).count();
    let dots = s.bytes().filter(|&b| b == b'.').count();
    if digits == 0 || dots > 1 || digits + dots != s.len() {
        return None;
    }
    s.parse().ok()
}

/// Parse a `LiveStartTime` value as civil time in `offset`
pub fn parse_live_start_time(value: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    START_TIME_FORMATS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .map(|naive| danmu_common::time::from_civil(naive, offset))
        .ok_or_else(|| Error::InvalidStartTime(value.to_string()))
}

/// One place a recording's start time might be found
///
/// `Ok(None)` is the expected "no record here" answer and lets the next
/// source try. `Err` is logged and also falls through.
#[async_trait]
pub trait StartTimeSource: Send + Sync {
    /// Source name for logs and reports
    fn name(&self) -> &'static str;

    async fn lookup(&self, live_id: &str) -> Result<Option<DateTime<FixedOffset>>>;
}

/// Start time recorded by the live recorder in the database
pub struct StoreStartTime<'a, S> {
    store: &'a S,
}

impl<'a, S: ChatStore> StoreStartTime<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ChatStore> StartTimeSource for StoreStartTime<'_, S> {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn lookup(&self, live_id: &str) -> Result<Option<DateTime<FixedOffset>>> {
        self.store.live_start_time(live_id).await
    }
}

/// `; LiveStartTime: ...` comment near the top of the input file
pub struct CommentStartTime {
    path: PathBuf,
    max_lines: usize,
    offset: FixedOffset,
}

impl CommentStartTime {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize, offset: FixedOffset) -> Self {
        Self {
            path: path.into(),
            max_lines,
            offset,
        }
    }
}

#[async_trait]
impl StartTimeSource for CommentStartTime {
    fn name(&self) -> &'static str {
        "file comment"
    }

    async fn lookup(&self, _live_id: &str) -> Result<Option<DateTime<FixedOffset>>> {
        let reader = BufReader::new(File::open(&self.path)?);
        match find_leading_comment(reader, LIVE_START_TIME_KEY, self.max_lines)? {
            Some(value) => parse_live_start_time(&value, self.offset).map(Some),
            None => Ok(None),
        }
    }
}

/// Start time plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBaseTime {
    pub at: DateTime<FixedOffset>,
    pub source: &'static str,
}

/// Ordered fallback chain of start-time sources
#[derive(Default)]
pub struct BaseTimeResolver<'a> {
    sources: Vec<Box<dyn StartTimeSource + 'a>>,
}

impl<'a> BaseTimeResolver<'a> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Append a source; earlier sources take precedence
    pub fn with_source(mut self, source: impl StartTimeSource + 'a) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Try each source in order; fails only when every source comes up empty
    pub async fn resolve(&self, live_id: &str) -> Result<ResolvedBaseTime> {
        for source in &self.sources {
            match source.lookup(live_id).await {
                Ok(Some(at)) => {
                    info!(
                        "Start time for live {} from {}: {}",
                        live_id,
                        source.name(),
                        at.format("%Y-%m-%d %H:%M:%S%.3f %:z")
                    );
                    return Ok(ResolvedBaseTime {
                        at,
                        source: source.name(),
                    });
                }
                Ok(None) => {
                    info!("No start time for live {} in {}, trying next source", live_id, source.name());
                }
                Err(e) => {
                    warn!("Start time lookup via {} failed for live {}: {}", source.name(), live_id, e);
                }
            }
        }

        Err(Error::StartTimeUnresolved(live_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn civil() -> FixedOffset {
        danmu_common::time::civil_offset(8).unwrap()
    }

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl StartTimeSource for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn lookup(&self, _live_id: &str) -> Result<Option<DateTime<FixedOffset>>> {
            self.0.map(|v| parse_live_start_time(v, civil())).transpose()
        }
    }

    struct Broken;

    #[async_trait]
    impl StartTimeSource for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn lookup(&self, _live_id: &str) -> Result<Option<DateTime<FixedOffset>>> {
            Err(Error::InvalidStartTime("garbage".to_string()))
        }
    }

    #[test]
    fn test_timestamp_examples() {
        assert_eq!(timestamp_to_seconds("1:02:03.500").unwrap(), 3723.5);
        assert_eq!(timestamp_to_seconds("02:03.5").unwrap(), 123.5);
        assert_eq!(timestamp_to_seconds("0:00:00.00").unwrap(), 0.0);
        assert_eq!(timestamp_to_seconds(" 0:00:07.25 ").unwrap(), 7.25);
        assert_eq!(timestamp_to_seconds("10:00:00").unwrap(), 36000.0);
    }

    #[test]
    fn test_timestamp_rejects_bad_shapes() {
        for raw in [
            "",
            "5.25",
            "1:2:3:4",
            "a:00:01.00",
            "0:xx:01.00",
            "0:00:1e3",
            "0:00:-1",
            "0:00:1.2.3",
            "0::01",
            "9999999999999999:00:00.00",
            "0:999999999999999999999:00.00",
        ] {
            assert!(
                matches!(timestamp_to_seconds(raw), Err(Error::InvalidTimestamp(_))),
                "should reject {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_timestamp_monotonic_per_component() {
        let base = timestamp_to_seconds("1:01:01.10").unwrap();
        assert!(timestamp_to_seconds("2:01:01.10").unwrap() > base);
        assert!(timestamp_to_seconds("1:02:01.10").unwrap() > base);
        assert!(timestamp_to_seconds("1:01:02.10").unwrap() > base);
        assert!(timestamp_to_seconds("1:01:01.11").unwrap() > base);
    }

    #[test]
    fn test_parse_live_start_time_formats() {
        let with_millis = parse_live_start_time("2025-12-25 10:00:00.123", civil()).unwrap();
        assert_eq!(with_millis.nanosecond(), 123_000_000);
        assert_eq!(with_millis.offset().local_minus_utc(), 8 * 3600);

        let plain = parse_live_start_time("2025-12-25 10:00:00", civil()).unwrap();
        assert_eq!(
            plain.naive_local(),
            NaiveDate::from_ymd_opt(2025, 12, 25).unwrap().and_hms_opt(10, 0, 0).unwrap()
        );

        assert!(parse_live_start_time("25/12/2025 10:00", civil()).is_err());
    }

    #[tokio::test]
    async fn test_resolver_first_hit_wins() {
        let resolver = BaseTimeResolver::new()
            .with_source(Fixed(Some("2025-01-01 00:00:00")))
            .with_source(Fixed(Some("2030-01-01 00:00:00")));
        let resolved = resolver.resolve("live").await.unwrap();
        assert_eq!(resolved.at.naive_local().date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(resolved.source, "fixed");
    }

    #[tokio::test]
    async fn test_resolver_falls_through_missing_and_errors() {
        let resolver = BaseTimeResolver::new()
            .with_source(Fixed(None))
            .with_source(Broken)
            .with_source(Fixed(Some("2025-01-01 00:00:00")));
        assert_eq!(resolver.source_names(), vec!["fixed", "broken", "fixed"]);
        assert!(resolver.resolve("live").await.is_ok());
    }

    #[tokio::test]
    async fn test_resolver_exhausted() {
        let resolver = BaseTimeResolver::new().with_source(Fixed(None)).with_source(Broken);
        let result = resolver.resolve("live").await;
        assert!(matches!(result, Err(Error::StartTimeUnresolved(id)) if id == "live"));
    }
}
