//! Database connections and write-path schema

pub mod connect;
pub mod schema;

pub use connect::*;
pub use schema::*;
