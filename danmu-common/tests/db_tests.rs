//! Tests for SQLite connection setup and chat schema creation

use danmu_common::db::{ensure_chat_schema, open_sqlite};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn tables(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_open_sqlite_creates_file_and_parent_dir() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("dir").join("danmu.db");
    assert!(!db_path.exists());

    let pool = open_sqlite(&db_path).await.unwrap();
    assert!(db_path.exists());

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_open_sqlite_reopens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("danmu.db");

    {
        let pool = open_sqlite(&db_path).await.unwrap();
        sqlx::query("CREATE TABLE marker (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = open_sqlite(&db_path).await.unwrap();
    assert_eq!(tables(&pool).await, vec!["marker".to_string()]);
}

#[tokio::test]
async fn test_chat_schema_without_history() {
    let temp_dir = TempDir::new().unwrap();
    let pool = open_sqlite(&temp_dir.path().join("danmu.db")).await.unwrap();
    let mut conn = pool.acquire().await.unwrap();

    ensure_chat_schema(&mut conn, false).await.unwrap();
    drop(conn);

    assert_eq!(
        tables(&pool).await,
        vec!["danmaku".to_string(), "streamer".to_string()]
    );
}

#[tokio::test]
async fn test_chat_schema_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let pool = open_sqlite(&temp_dir.path().join("danmu.db")).await.unwrap();
    let mut conn = pool.acquire().await.unwrap();

    ensure_chat_schema(&mut conn, true).await.unwrap();
    sqlx::query("INSERT INTO streamer (uid, name) VALUES (1, 'Alice')")
        .execute(&mut *conn)
        .await
        .unwrap();
    ensure_chat_schema(&mut conn, true).await.unwrap();
    drop(conn);

    assert_eq!(
        tables(&pool).await,
        vec![
            "danmaku".to_string(),
            "streamer".to_string(),
            "streamer_name_history".to_string()
        ]
    );

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM streamer")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_streamer_uid_is_unique() {
    let temp_dir = TempDir::new().unwrap();
    let pool = open_sqlite(&temp_dir.path().join("danmu.db")).await.unwrap();
    let mut conn = pool.acquire().await.unwrap();
    ensure_chat_schema(&mut conn, false).await.unwrap();

    sqlx::query("INSERT INTO streamer (uid, name) VALUES (1, 'Alice')")
        .execute(&mut *conn)
        .await
        .unwrap();
    let duplicate = sqlx::query("INSERT INTO streamer (uid, name) VALUES (1, 'Other')")
        .execute(&mut *conn)
        .await;
    assert!(duplicate.is_err());
}
