//! SQLite tables used by the chat write path
//!
//! All statements are idempotent (`IF NOT EXISTS`) so they can run at the start
//! of every write transaction.

use crate::Result;
use sqlx::sqlite::SqliteConnection;

/// Create the `streamer` registry table (current name per uid)
pub async fn create_streamer_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS streamer (
            uid INTEGER NOT NULL PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Create the `streamer_name_history` interval table
///
/// One row per (uid, name) interval. `end_date IS NULL` marks the current name;
/// at most one such row exists per uid.
pub async fn create_streamer_name_history_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS streamer_name_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uid INTEGER NOT NULL,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_streamer_name_history_uid ON streamer_name_history(uid)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Create the `danmaku` message table
pub async fn create_danmaku_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS danmaku (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            liveId TEXT NOT NULL,
            startTime REAL NOT NULL,
            sendTime TEXT NOT NULL,
            uid INTEGER NOT NULL,
            content TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    // Purge-before-insert is scoped by liveId
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_danmaku_live_id ON danmaku(liveId)")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Create every table the write path needs
pub async fn ensure_chat_schema(conn: &mut SqliteConnection, name_history: bool) -> Result<()> {
    create_streamer_table(conn).await?;
    if name_history {
        create_streamer_name_history_table(conn).await?;
    }
    create_danmaku_table(conn).await?;
    Ok(())
}
