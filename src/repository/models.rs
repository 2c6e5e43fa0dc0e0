//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Platform record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::platforms)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PlatformRecord {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub logo_url: String,
    pub enabled: bool,
    pub created_at: String,
}

/// New platform for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::platforms)]
pub struct NewPlatform<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub logo_url: &'a str,
    pub enabled: bool,
    pub created_at: &'a str,
}

/// Activity record row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::activity_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActivityRow {
    pub id: i32,
    pub platform_id: i32,
    pub title: String,
    pub episode_info: Option<String>,
    pub watched_at: String,
    pub duration_minutes: i32,
    pub thumbnail_url: Option<String>,
    pub genre: Option<String>,
    pub created_at: String,
}

/// New activity record for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::activity_records)]
pub struct NewActivity<'a> {
    pub platform_id: i32,
    pub title: &'a str,
    pub episode_info: Option<&'a str>,
    pub watched_at: &'a str,
    pub duration_minutes: i32,
    pub thumbnail_url: Option<&'a str>,
    pub genre: Option<&'a str>,
    pub created_at: &'a str,
}

/// Run outcome row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::run_outcomes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunOutcomeRow {
    pub id: i32,
    pub platform_id: i32,
    pub started_at: String,
    pub status: String,
    pub error_message: Option<String>,
    pub items_scraped: i32,
}

/// New run outcome for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::run_outcomes)]
pub struct NewRunOutcome<'a> {
    pub platform_id: i32,
    pub started_at: &'a str,
    pub status: &'a str,
    pub error_message: Option<&'a str>,
    pub items_scraped: i32,
}
