//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM on SQLite.

pub mod context;
pub mod history;
pub mod models;
pub mod pool;
pub mod util;

pub use context::{DbContext, KNOWN_PLATFORMS};
pub use history::{DieselHistoryRepository, HistoryStore};
pub use pool::{AsyncSqlitePool, DieselError};
pub use util::{format_datetime, parse_datetime, parse_datetime_opt};
