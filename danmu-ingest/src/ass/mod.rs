//! Subtitle-format chat recordings
//!
//! - `scanner`: section headers and `; Key: value` metadata comments
//! - `event`: `Dialogue:` lines into [`event::ChatRecord`]s

pub mod event;
pub mod scanner;
