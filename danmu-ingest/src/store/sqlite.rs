//! SQLite backend
//!
//! Tables:
//! - `acfunlive(liveId, startTime)`: written by the live recorder, start time as
//!   a millisecond Unix epoch. Read-only here.
//! - `streamer(uid, name)`: sender registry, current name only.
//! - `streamer_name_history`: interval log, on unless disabled (see [`RegistryShape`]).
//! - `danmaku`: message rows, send time as UTC text.

use super::{ChatStore, IdentityChange, MessageRow, Sender};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use danmu_common::time::{format_utc_seconds, from_epoch_millis};
use sqlx::{Executor, Sqlite, SqlitePool, Transaction};
use tracing::debug;

const INSERT_DANMAKU_SQL: &str =
    "INSERT INTO danmaku (liveId, startTime, sendTime, uid, content) VALUES (?, ?, ?, ?, ?)";

/// How sender names are tracked over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryShape {
    /// `streamer` holds the current name; renames overwrite it
    CurrentName,
    /// `streamer` plus `streamer_name_history` intervals (open interval = current)
    #[default]
    Intervals,
}

/// SQLite chat store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    shape: RegistryShape,
    offset: FixedOffset,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, offset: FixedOffset) -> Self {
        Self {
            pool,
            shape: RegistryShape::default(),
            offset,
        }
    }

    pub fn with_registry_shape(mut self, shape: RegistryShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    type Db = Sqlite;

    fn backend_name(&self) -> &'static str {
        "SQLite"
    }

    fn civil_offset(&self) -> FixedOffset {
        self.offset
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    async fn live_start_time(&self, live_id: &str) -> Result<Option<DateTime<FixedOffset>>> {
        let millis: Option<i64> =
            sqlx::query_scalar("SELECT startTime FROM acfunlive WHERE liveId = ?")
                .bind(live_id)
                .fetch_optional(&self.pool)
                .await?;

        millis
            .map(|ms| {
                from_epoch_millis(ms, self.offset)
                    .ok_or_else(|| Error::InvalidStartTime(ms.to_string()))
            })
            .transpose()
    }

    async fn ensure_schema(&self, tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
        danmu_common::db::ensure_chat_schema(&mut **tx, self.shape == RegistryShape::Intervals)
            .await?;
        Ok(())
    }

    async fn reconcile_identity(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        sender: &Sender<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<IdentityChange> {
        let existing: Option<String> = sqlx::query_scalar("SELECT name FROM streamer WHERE uid = ?")
            .bind(sender.id)
            .fetch_optional(&mut **tx)
            .await?;

        let stamp = format_utc_seconds(now);

        match existing {
            None => {
                sqlx::query("INSERT INTO streamer (uid, name) VALUES (?, ?)")
                    .bind(sender.id)
                    .bind(sender.name)
                    .execute(&mut **tx)
                    .await?;

                if self.shape == RegistryShape::Intervals {
                    open_interval(tx, sender, &stamp).await?;
                }
                Ok(IdentityChange::Inserted)
            }
            Some(name) if name == sender.name => Ok(IdentityChange::Unchanged),
            Some(previous) => {
                sqlx::query("UPDATE streamer SET name = ? WHERE uid = ?")
                    .bind(sender.name)
                    .bind(sender.id)
                    .execute(&mut **tx)
                    .await?;

                if self.shape == RegistryShape::Intervals {
                    sqlx::query(
                        "UPDATE streamer_name_history SET end_date = ? WHERE uid = ? AND end_date IS NULL",
                    )
                    .bind(&stamp)
                    .bind(sender.id)
                    .execute(&mut **tx)
                    .await?;
                    open_interval(tx, sender, &stamp).await?;
                }
                Ok(IdentityChange::Renamed { previous })
            }
        }
    }

    async fn purge_messages(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        live_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM danmaku WHERE liveId = ?")
            .bind(live_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn prepare_message_insert(&self, tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
        (&mut **tx).prepare(INSERT_DANMAKU_SQL).await?;
        debug!("Prepared danmaku insert statement");
        Ok(())
    }

    async fn insert_message(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        row: &MessageRow<'_>,
    ) -> Result<()> {
        sqlx::query(INSERT_DANMAKU_SQL)
            .bind(row.live_id)
            .bind(row.offset_seconds)
            .bind(format_utc_seconds(row.send_time))
            .bind(row.sender_id)
            .bind(row.text)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

async fn open_interval(
    tx: &mut Transaction<'_, Sqlite>,
    sender: &Sender<'_>,
    stamp: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO streamer_name_history (uid, name, start_date, end_date) VALUES (?, ?, ?, NULL)",
    )
    .bind(sender.id)
    .bind(sender.name)
    .bind(stamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
