//! streamtally - streaming watch-history harvesting and import.
//!
//! Drives logged-in browser sessions against streaming services, normalizes
//! what their history pages show into activity records, and keeps them in a
//! local SQLite store alongside CSV exports enriched from TMDB.

pub mod cli;
pub mod config;
pub mod import;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
