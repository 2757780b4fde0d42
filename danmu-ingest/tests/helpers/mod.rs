//! Shared fixtures for danmu-ingest integration tests

#![allow(dead_code)]

use chrono::{FixedOffset, NaiveDate};
use danmu_common::time::{civil_offset, from_civil};
use danmu_ingest::store::{RegistryShape, SqliteStore};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stored danmaku row: (liveId, startTime, sendTime, uid, content)
pub type DanmakuRow = (String, f64, String, i64, String);

pub fn civil() -> FixedOffset {
    civil_offset(8).unwrap()
}

/// Temporary SQLite store; keep the TempDir alive for the duration of the test
pub async fn create_test_store(shape: RegistryShape) -> (TempDir, SqliteStore) {
    let temp_dir = TempDir::new().unwrap();
    let pool = danmu_common::db::open_sqlite(&temp_dir.path().join("danmu.db"))
        .await
        .unwrap();
    let store = SqliteStore::new(pool, civil()).with_registry_shape(shape);
    (temp_dir, store)
}

/// Render a recording with optional metadata comments and the given events
pub fn recording(live_id: Option<&str>, start_time: Option<&str>, events: &[&str]) -> String {
    let mut text = String::from("[Script Info]\n; Script generated by live recorder\n");
    if let Some(id) = live_id {
        text.push_str(&format!("; LiveID: {}\n", id));
    }
    if let Some(start) = start_time {
        text.push_str(&format!("; LiveStartTime: {}\n", start));
    }
    text.push_str("ScriptType: v4.00+\nPlayResX: 1920\nPlayResY: 1080\n\n");
    text.push_str("[V4+ Styles]\nFormat: Name, Fontname, Fontsize\nStyle: Danmu,Microsoft YaHei,64\n\n");
    text.push_str(
        "[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
    );
    for event in events {
        text.push_str(event);
        text.push('\n');
    }
    text
}

/// `Dialogue:` line for `name` at `start` with `text`
pub fn dialogue(start: &str, name: &str, text: &str) -> String {
    format!(
        "Dialogue: 0,{},0:59:59.00,Danmu,{},0,0,0,,{{\\move(1920,40,-200,40)}}{}",
        start, name, text
    )
}

pub fn write_recording(dir: &Path, file_name: &str, contents: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Register a start time the way the live recorder does (epoch millis)
pub async fn register_live_start(pool: &SqlitePool, live_id: &str, civil_time: (i32, u32, u32, u32, u32, u32)) {
    let (y, mo, d, h, mi, s) = civil_time;
    let naive = NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap();
    let millis = from_civil(naive, civil()).timestamp_millis();

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS acfunlive (liveId TEXT PRIMARY KEY, startTime INTEGER NOT NULL)",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO acfunlive (liveId, startTime) VALUES (?, ?)")
        .bind(live_id)
        .bind(millis)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn danmaku_rows(pool: &SqlitePool, live_id: &str) -> Vec<DanmakuRow> {
    sqlx::query_as(
        "SELECT liveId, startTime, sendTime, uid, content FROM danmaku WHERE liveId = ? ORDER BY startTime, uid",
    )
    .bind(live_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

pub async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap();
    count > 0
}

pub async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}
