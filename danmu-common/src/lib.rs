//! # Danmu Common Library
//!
//! Shared code for the danmu tools including:
//! - Configuration loading (TOML bootstrap file)
//! - Database connections for the SQLite and MySQL backends
//! - SQLite schema for the chat write path
//! - Civil timezone helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
