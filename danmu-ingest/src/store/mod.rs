//! Storage backends for chat messages and the sender registry
//!
//! Both backends share the transactional shape driven by
//! [`crate::writer::write_chat`]; they differ only in how the send time is
//! stored and how sender name history is kept:
//!
//! | Backend | Send time                | Sender history                         |
//! |---------|--------------------------|----------------------------------------|
//! | SQLite  | UTC `YYYY-MM-DD HH:MM:SS`| current name only, or interval table   |
//! | MySQL   | civil `DATETIME`         | former-names list + `userOld` intervals|

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use sqlx::Transaction;

pub mod mysql;
pub mod sqlite;

pub use mysql::MySqlStore;
pub use sqlite::{RegistryShape, SqliteStore};

/// A sender as seen in one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender<'a> {
    pub id: i64,
    pub name: &'a str,
}

/// What reconciling a sender did to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum IdentityChange {
    /// First time this id was seen
    Inserted,
    /// Known id with a new name; the previous name's interval was closed
    Renamed { previous: String },
    /// Known id, same name
    Unchanged,
}

/// One message row ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow<'a> {
    pub live_id: &'a str,
    pub offset_seconds: f64,
    pub send_time: DateTime<FixedOffset>,
    pub sender_id: i64,
    pub text: &'a str,
}

/// Backend capability used by the writer and the start-time resolver
///
/// All write operations run inside one transaction owned by the caller.
#[async_trait]
pub trait ChatStore: Send + Sync {
    type Db: sqlx::Database;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Civil timezone used for stored and looked-up times
    fn civil_offset(&self) -> FixedOffset;

    /// Open the write transaction
    async fn begin(&self) -> Result<Transaction<'static, Self::Db>>;

    /// Recorded start time of a live, `None` when the recorder has no row for it
    async fn live_start_time(&self, live_id: &str) -> Result<Option<DateTime<FixedOffset>>>;

    /// Make sure the tables the write path touches exist
    async fn ensure_schema(&self, tx: &mut Transaction<'_, Self::Db>) -> Result<()>;

    /// Bring the registry entry for `sender` up to date
    ///
    /// `now` stamps any interval opened or closed by this call. The writer runs
    /// this inside a savepoint, so an `Err` leaves the registry as it was.
    async fn reconcile_identity(
        &self,
        tx: &mut Transaction<'_, Self::Db>,
        sender: &Sender<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<IdentityChange>;

    /// Delete every message row of `live_id`, returning how many were removed
    async fn purge_messages(
        &self,
        tx: &mut Transaction<'_, Self::Db>,
        live_id: &str,
    ) -> Result<u64>;

    /// Prepare the message insert statement on the transaction's connection
    async fn prepare_message_insert(&self, tx: &mut Transaction<'_, Self::Db>) -> Result<()>;

    async fn insert_message(
        &self,
        tx: &mut Transaction<'_, Self::Db>,
        row: &MessageRow<'_>,
    ) -> Result<()>;
}
