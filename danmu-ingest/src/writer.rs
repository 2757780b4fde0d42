//! Transactional write of one recording's chat
//!
//! One transaction per recording:
//! 1. reconcile every distinct sender with the registry,
//! 2. delete all rows previously stored for the live id,
//! 3. insert the new rows.
//!
//! Each sender is reconciled inside its own savepoint. A failing sender or row
//! is logged and skipped with none of its statements applied. Failing to begin,
//! set up the schema, purge, prepare the insert, or commit rolls everything back.

use crate::ass::event::ChatRecord;
use crate::error::{Error, Result};
use crate::store::{ChatStore, IdentityChange, MessageRow, Sender};
use chrono::{DateTime, FixedOffset};
use danmu_common::time::{add_seconds, now_in};
use serde::Serialize;
use sqlx::{Acquire, Transaction};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Per-recording counts of registry changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityStats {
    pub inserted: usize,
    pub renamed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Outcome of a committed write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Rows inserted and committed
    pub inserted: usize,
    /// Rows whose insert failed and was skipped
    pub failed_rows: usize,
    /// Rows removed from a previous write of the same live id
    pub purged: u64,
    pub identities: IdentityStats,
}

/// Distinct identified senders, keyed by id; the last name seen in file order wins
pub fn distinct_senders(records: &[ChatRecord]) -> BTreeMap<i64, &str> {
    let mut senders = BTreeMap::new();
    for record in records.iter().filter(|r| r.is_persistable()) {
        senders.insert(record.sender_id, record.sender_name.as_str());
    }
    senders
}

/// Replace everything stored for `live_id` with `records`
///
/// Send times are `base_time + offset`. Anonymous records are not stored.
pub async fn write_chat<S: ChatStore>(
    store: &S,
    live_id: &str,
    records: &[ChatRecord],
    base_time: DateTime<FixedOffset>,
) -> Result<WriteSummary> {
    let mut tx = store.begin().await?;

    if let Err(e) = store.ensure_schema(&mut tx).await {
        return Err(abort(tx, "schema setup", e).await);
    }

    let now = now_in(store.civil_offset());
    let mut summary = WriteSummary::default();

    for (id, name) in distinct_senders(records) {
        let sender = Sender { id, name };
        match reconcile_in_savepoint(store, &mut tx, &sender, now).await {
            Ok(IdentityChange::Inserted) => {
                summary.identities.inserted += 1;
                info!("New sender uid={} name={}", id, name);
            }
            Ok(IdentityChange::Renamed { previous }) => {
                summary.identities.renamed += 1;
                info!("Sender uid={} renamed {} -> {}", id, previous, name);
            }
            Ok(IdentityChange::Unchanged) => {
                summary.identities.unchanged += 1;
            }
            Err(e) => {
                summary.identities.failed += 1;
                warn!("Failed to reconcile sender uid={}: {}", id, e);
            }
        }
    }

    summary.purged = match store.purge_messages(&mut tx, live_id).await {
        Ok(purged) => purged,
        Err(e) => return Err(abort(tx, "purge", e).await),
    };
    if summary.purged > 0 {
        debug!("Removed {} previous rows for live {}", summary.purged, live_id);
    }

    if let Err(e) = store.prepare_message_insert(&mut tx).await {
        return Err(abort(tx, "insert prepare", e).await);
    }

    for record in records.iter().filter(|r| r.is_persistable()) {
        let row = MessageRow {
            live_id,
            offset_seconds: record.offset_seconds,
            send_time: add_seconds(base_time, record.offset_seconds),
            sender_id: record.sender_id,
            text: &record.text,
        };
        match store.insert_message(&mut tx, &row).await {
            Ok(()) => summary.inserted += 1,
            Err(e) => {
                summary.failed_rows += 1;
                warn!(
                    "Failed to insert danmaku at {:.2}s from uid={}: {}",
                    record.offset_seconds, record.sender_id, e
                );
            }
        }
    }

    if let Err(e) = tx.commit().await {
        error!("Commit failed for live {}: {}", live_id, e);
        return Err(Error::Database(e));
    }

    info!(
        "Wrote {} danmaku for live {} to {}",
        summary.inserted,
        live_id,
        store.backend_name()
    );

    Ok(summary)
}

/// Reconcile one sender so that a failure undoes every statement it ran
async fn reconcile_in_savepoint<S: ChatStore>(
    store: &S,
    tx: &mut Transaction<'static, S::Db>,
    sender: &Sender<'_>,
    now: DateTime<FixedOffset>,
) -> Result<IdentityChange> {
    let mut savepoint = (&mut *tx).begin().await?;
    match store.reconcile_identity(&mut savepoint, sender, now).await {
        Ok(change) => {
            savepoint.commit().await?;
            Ok(change)
        }
        Err(e) => {
            if let Err(rollback_err) = savepoint.rollback().await {
                warn!("Savepoint rollback failed for uid={}: {}", sender.id, rollback_err);
            }
            Err(e)
        }
    }
}

async fn abort<DB: sqlx::Database>(tx: Transaction<'static, DB>, step: &str, e: Error) -> Error {
    error!("Danmaku write failed during {}: {}; rolling back", step, e);
    if let Err(rollback_err) = tx.rollback().await {
        warn!("Rollback failed: {}", rollback_err);
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str) -> ChatRecord {
        ChatRecord {
            offset_seconds: 1.0,
            sender_name: name.to_string(),
            sender_id: id,
            text: "hi".to_string(),
        }
    }

    #[test]
    fn test_distinct_senders_last_name_wins() {
        let records = vec![
            record(7, "Old"),
            record(3, "Carol"),
            record(0, "Guest"),
            record(7, "New"),
        ];
        let senders = distinct_senders(&records);
        assert_eq!(senders.len(), 2);
        assert_eq!(senders[&7], "New");
        assert_eq!(senders[&3], "Carol");
        assert!(!senders.contains_key(&0));
    }

    #[test]
    fn test_distinct_senders_empty() {
        assert!(distinct_senders(&[record(0, "Guest")]).is_empty());
    }
}
