//! MySQL backend
//!
//! Tables (provisioned by the live recorder, not created here):
//! - `live(liveId, startTime DATETIME)`: recorded start, civil time.
//! - `user(uid, name, fNames)`: sender registry; `fNames` lists former names,
//!   newest first, comma separated.
//! - `userOld(uid, oldName, startDate, endDate)`: one interval per name;
//!   `endDate IS NULL` marks the current one.
//! - `danmaku(liveId, startTime, sendTime DATETIME, uid, content)`.

use super::{ChatStore, IdentityChange, MessageRow, Sender};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use danmu_common::time::from_civil;
use sqlx::{Executor, MySql, MySqlPool, Transaction};
use tracing::debug;

const INSERT_DANMAKU_SQL: &str =
    "INSERT INTO danmaku (liveId, startTime, sendTime, uid, content) VALUES (?, ?, ?, ?, ?)";

/// Cap on the number of names kept in `user.fNames`
pub const MAX_FORMER_NAMES: usize = 10;

/// MySQL chat store
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    offset: FixedOffset,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool, offset: FixedOffset) -> Self {
        Self { pool, offset }
    }
}

/// Push `previous` onto the front of a comma-joined former-names list
///
/// Empty entries are dropped and the result keeps at most
/// [`MAX_FORMER_NAMES`] names.
pub fn prepend_former_name(previous: &str, former: Option<&str>) -> String {
    std::iter::once(previous)
        .chain(former.unwrap_or_default().split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .take(MAX_FORMER_NAMES)
        .collect::<Vec<_>>()
        .join(",")
}

/// Registry writes needed for one sender, decided from its current `user` row
#[derive(Debug, Clone, PartialEq, Eq)]
enum UserUpdate {
    /// No row yet: insert it and open the first interval
    Insert,
    /// Same name: nothing to write
    Keep,
    /// New name: rewrite the row, close the open interval, open a new one
    Rename {
        previous: String,
        former_names: String,
    },
}

fn plan_user_update(existing: Option<(String, Option<String>)>, name: &str) -> UserUpdate {
    match existing {
        None => UserUpdate::Insert,
        Some((current, _)) if current == name => UserUpdate::Keep,
        Some((previous, former)) => UserUpdate::Rename {
            former_names: prepend_former_name(&previous, former.as_deref()),
            previous,
        },
    }
}

#[async_trait]
impl ChatStore for MySqlStore {
    type Db = MySql;

    fn backend_name(&self) -> &'static str {
        "MySQL"
    }

    fn civil_offset(&self) -> FixedOffset {
        self.offset
    }

    async fn begin(&self) -> Result<Transaction<'static, MySql>> {
        Ok(self.pool.begin().await?)
    }

    async fn live_start_time(&self, live_id: &str) -> Result<Option<DateTime<FixedOffset>>> {
        let start: Option<NaiveDateTime> =
            sqlx::query_scalar("SELECT startTime FROM live WHERE liveId = ?")
                .bind(live_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(start.map(|naive| from_civil(naive, self.offset)))
    }

    async fn ensure_schema(&self, _tx: &mut Transaction<'_, MySql>) -> Result<()> {
        debug!("MySQL schema is provisioned externally");
        Ok(())
    }

    async fn reconcile_identity(
        &self,
        tx: &mut Transaction<'_, MySql>,
        sender: &Sender<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<IdentityChange> {
        let existing: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT name, fNames FROM `user` WHERE uid = ?")
                .bind(sender.id)
                .fetch_optional(&mut **tx)
                .await?;

        let stamp = now.naive_local();

        match plan_user_update(existing, sender.name) {
            UserUpdate::Insert => {
                sqlx::query("INSERT INTO `user` (uid, name, fNames) VALUES (?, ?, NULL)")
                    .bind(sender.id)
                    .bind(sender.name)
                    .execute(&mut **tx)
                    .await?;
                open_interval(tx, sender, stamp).await?;
                Ok(IdentityChange::Inserted)
            }
            UserUpdate::Keep => Ok(IdentityChange::Unchanged),
            UserUpdate::Rename {
                previous,
                former_names,
            } => {
                sqlx::query("UPDATE `user` SET name = ?, fNames = ? WHERE uid = ?")
                    .bind(sender.name)
                    .bind(&former_names)
                    .bind(sender.id)
                    .execute(&mut **tx)
                    .await?;

                sqlx::query("UPDATE userOld SET endDate = ? WHERE uid = ? AND endDate IS NULL")
                    .bind(stamp)
                    .bind(sender.id)
                    .execute(&mut **tx)
                    .await?;
                open_interval(tx, sender, stamp).await?;
                Ok(IdentityChange::Renamed { previous })
            }
        }
    }

    async fn purge_messages(
        &self,
        tx: &mut Transaction<'_, MySql>,
        live_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM danmaku WHERE liveId = ?")
            .bind(live_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn prepare_message_insert(&self, tx: &mut Transaction<'_, MySql>) -> Result<()> {
        (&mut **tx).prepare(INSERT_DANMAKU_SQL).await?;
        debug!("Prepared danmaku insert statement");
        Ok(())
    }

    async fn insert_message(
        &self,
        tx: &mut Transaction<'_, MySql>,
        row: &MessageRow<'_>,
    ) -> Result<()> {
        sqlx::query(INSERT_DANMAKU_SQL)
            .bind(row.live_id)
            .bind(row.offset_seconds)
            .bind(row.send_time.naive_local())
            .bind(row.sender_id)
            .bind(row.text)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

async fn open_interval(
    tx: &mut Transaction<'_, MySql>,
    sender: &Sender<'_>,
    stamp: NaiveDateTime,
) -> Result<()> {
    sqlx::query("INSERT INTO userOld (uid, oldName, startDate, endDate) VALUES (?, ?, ?, NULL)")
        .bind(sender.id)
        .bind(sender.name)
        .bind(stamp)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
