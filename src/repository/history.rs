//! Watch-history store.
//!
//! `HistoryStore` is the narrow contract the harvest pipeline consumes. The
//! Diesel repository implements it on SQLite and adds the read paths used by
//! the CLI.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use super::models::{ActivityRow, NewActivity, NewRunOutcome, PlatformRecord, RunOutcomeRow};
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::{format_datetime, parse_datetime, parse_datetime_opt};
use crate::models::{
    ActivityRecord, PlatformIdentity, PlatformStats, RunOutcome, RunStatus, StoredActivity,
};
use crate::schema::{activity_records, platforms, run_outcomes};

/// Store operations the harvest pipeline depends on.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Resolve a platform's persisted identity by display name.
    async fn find_platform(&self, name: &str) -> Result<Option<PlatformIdentity>, DieselError>;

    /// All known platforms.
    async fn list_platforms(&self) -> Result<Vec<PlatformIdentity>, DieselError>;

    /// Whether an event with this platform, title, episode label and
    /// timestamp is already stored. An empty label matches records without one.
    async fn record_exists(
        &self,
        platform_id: i32,
        title: &str,
        episode_info: &str,
        watched_at: DateTime<Utc>,
    ) -> Result<bool, DieselError>;

    /// Whether any record holds the `(platform, title, watched_at)` key,
    /// whatever its episode label.
    async fn event_exists(
        &self,
        platform_id: i32,
        title: &str,
        watched_at: DateTime<Utc>,
    ) -> Result<bool, DieselError>;

    /// Whether writing this event would add nothing new: either the exact
    /// record is stored, or another record already owns its key (two episodes
    /// of one show watched the same day).
    async fn already_stored(
        &self,
        platform_id: i32,
        title: &str,
        episode_info: &str,
        watched_at: DateTime<Utc>,
    ) -> Result<bool, DieselError> {
        if self
            .record_exists(platform_id, title, episode_info, watched_at)
            .await?
        {
            return Ok(true);
        }
        self.event_exists(platform_id, title, watched_at).await
    }

    /// Insert a record, or refresh its non-key fields on key collision.
    async fn upsert_record(&self, record: &ActivityRecord) -> Result<(), DieselError>;

    /// Append an immutable run outcome.
    async fn append_run_outcome(&self, outcome: &RunOutcome) -> Result<(), DieselError>;

    /// Most recent run outcome per platform, newest first.
    async fn latest_runs(&self) -> Result<Vec<RunOutcome>, DieselError>;
}

impl From<PlatformRecord> for PlatformIdentity {
    fn from(record: PlatformRecord) -> Self {
        PlatformIdentity {
            id: record.id,
            name: record.name,
            color: record.color,
            logo_url: record.logo_url,
            enabled: record.enabled,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

impl From<ActivityRow> for StoredActivity {
    fn from(row: ActivityRow) -> Self {
        StoredActivity {
            id: row.id,
            record: ActivityRecord {
                platform_id: row.platform_id,
                title: row.title,
                episode_info: row.episode_info,
                watched_at: parse_datetime(&row.watched_at),
                duration_minutes: row.duration_minutes,
                thumbnail_url: row.thumbnail_url,
                genre: row.genre,
            },
            created_at: parse_datetime(&row.created_at),
        }
    }
}

fn outcome_from_row(row: RunOutcomeRow, platform: String) -> RunOutcome {
    RunOutcome {
        platform_id: row.platform_id,
        platform,
        started_at: parse_datetime(&row.started_at),
        // Unknown statuses only come from manual edits; treat them as failures.
        status: row.status.parse().unwrap_or(RunStatus::Failed),
        error_message: row.error_message,
        items_scraped: row.items_scraped,
    }
}

/// Diesel-backed watch-history repository.
#[derive(Clone)]
pub struct DieselHistoryRepository {
    pool: AsyncSqlitePool,
}

impl DieselHistoryRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Enable or disable a platform. Returns false if no such platform exists.
    pub async fn set_platform_enabled(
        &self,
        name: &str,
        enabled: bool,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::update(platforms::table.filter(platforms::name.eq(name)))
            .set(platforms::enabled.eq(enabled))
            .execute(&mut conn)
            .await?;

        Ok(rows > 0)
    }

    /// Most recent records for a platform, newest first.
    pub async fn list_history(
        &self,
        platform_id: i32,
        limit: i64,
    ) -> Result<Vec<StoredActivity>, DieselError> {
        let mut conn = self.pool.get().await?;

        activity_records::table
            .filter(activity_records::platform_id.eq(platform_id))
            .order((activity_records::watched_at.desc(), activity_records::id.desc()))
            .limit(limit)
            .select(ActivityRow::as_select())
            .load::<ActivityRow>(&mut conn)
            .await
            .map(|rows| rows.into_iter().map(StoredActivity::from).collect())
    }

    /// Count all stored records for a platform.
    pub async fn count_records(&self, platform_id: i32) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        activity_records::table
            .filter(activity_records::platform_id.eq(platform_id))
            .select(count_star())
            .first(&mut conn)
            .await
    }

    /// Viewing totals per enabled platform for `[start, end)`, largest first.
    pub async fn platform_stats(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PlatformStats>, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;
        let start = format_datetime(&start);
        let end = format_datetime(&end);

        let totals: Vec<(i32, Option<i64>, i64, Option<String>)> = activity_records::table
            .filter(activity_records::watched_at.ge(&start))
            .filter(activity_records::watched_at.lt(&end))
            .group_by(activity_records::platform_id)
            .select((
                activity_records::platform_id,
                diesel::dsl::sum(activity_records::duration_minutes),
                count_star(),
                diesel::dsl::max(activity_records::watched_at),
            ))
            .load(&mut conn)
            .await?;
        let mut totals: HashMap<i32, (i64, i64, Option<String>)> = totals
            .into_iter()
            .map(|(id, minutes, count, last)| (id, (minutes.unwrap_or(0), count, last)))
            .collect();

        let enabled = platforms::table
            .filter(platforms::enabled.eq(true))
            .select(PlatformRecord::as_select())
            .load::<PlatformRecord>(&mut conn)
            .await?;

        let mut stats: Vec<PlatformStats> = enabled
            .into_iter()
            .map(|p| {
                let (total_minutes, total_records, last) =
                    totals.remove(&p.id).unwrap_or((0, 0, None));
                PlatformStats {
                    platform_id: p.id,
                    name: p.name,
                    color: p.color,
                    total_minutes,
                    total_records,
                    last_watched: parse_datetime_opt(last),
                }
            })
            .collect();
        stats.sort_by(|a, b| b.total_minutes.cmp(&a.total_minutes));

        Ok(stats)
    }
}

#[async_trait]
impl HistoryStore for DieselHistoryRepository {
    async fn find_platform(&self, name: &str) -> Result<Option<PlatformIdentity>, DieselError> {
        let mut conn = self.pool.get().await?;

        platforms::table
            .filter(platforms::name.eq(name))
            .select(PlatformRecord::as_select())
            .first::<PlatformRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(PlatformIdentity::from))
    }

    async fn list_platforms(&self) -> Result<Vec<PlatformIdentity>, DieselError> {
        let mut conn = self.pool.get().await?;

        platforms::table
            .order(platforms::id.asc())
            .select(PlatformRecord::as_select())
            .load::<PlatformRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(PlatformIdentity::from).collect())
    }

    async fn record_exists(
        &self,
        platform_id: i32,
        title: &str,
        episode_info: &str,
        watched_at: DateTime<Utc>,
    ) -> Result<bool, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;
        let watched_at = format_datetime(&watched_at);

        let mut query = activity_records::table
            .filter(activity_records::platform_id.eq(platform_id))
            .filter(activity_records::title.eq(title))
            .filter(activity_records::watched_at.eq(watched_at))
            .select(count_star())
            .into_boxed();

        // Empty labels are never stored, see upsert_record.
        query = if episode_info.is_empty() {
            query.filter(activity_records::episode_info.is_null())
        } else {
            query.filter(activity_records::episode_info.eq(episode_info.to_string()))
        };

        let count: i64 = query.first(&mut conn).await?;
        Ok(count > 0)
    }

    async fn event_exists(
        &self,
        platform_id: i32,
        title: &str,
        watched_at: DateTime<Utc>,
    ) -> Result<bool, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        let count: i64 = activity_records::table
            .filter(activity_records::platform_id.eq(platform_id))
            .filter(activity_records::title.eq(title))
            .filter(activity_records::watched_at.eq(format_datetime(&watched_at)))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count > 0)
    }

    async fn upsert_record(&self, record: &ActivityRecord) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let watched_at = format_datetime(&record.watched_at);
        let created_at = format_datetime(&Utc::now());
        let new = NewActivity {
            platform_id: record.platform_id,
            title: &record.title,
            episode_info: record.episode_info.as_deref().filter(|e| !e.is_empty()),
            watched_at: &watched_at,
            duration_minutes: record.duration_minutes,
            thumbnail_url: record.thumbnail_url.as_deref(),
            genre: record.genre.as_deref(),
            created_at: &created_at,
        };

        diesel::insert_into(activity_records::table)
            .values(&new)
            .on_conflict((
                activity_records::platform_id,
                activity_records::title,
                activity_records::watched_at,
            ))
            .do_update()
            .set((
                activity_records::duration_minutes
                    .eq(excluded(activity_records::duration_minutes)),
                activity_records::episode_info.eq(excluded(activity_records::episode_info)),
                activity_records::thumbnail_url.eq(excluded(activity_records::thumbnail_url)),
                activity_records::genre.eq(excluded(activity_records::genre)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn append_run_outcome(&self, outcome: &RunOutcome) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let started_at = format_datetime(&outcome.started_at);
        diesel::insert_into(run_outcomes::table)
            .values(NewRunOutcome {
                platform_id: outcome.platform_id,
                started_at: &started_at,
                status: outcome.status.as_str(),
                error_message: outcome.error_message.as_deref(),
                items_scraped: outcome.items_scraped,
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn latest_runs(&self) -> Result<Vec<RunOutcome>, DieselError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<(RunOutcomeRow, String)> = run_outcomes::table
            .inner_join(platforms::table)
            .order((run_outcomes::started_at.desc(), run_outcomes::id.desc()))
            .select((RunOutcomeRow::as_select(), platforms::name))
            .load(&mut conn)
            .await?;

        let mut seen = std::collections::HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|(row, _)| seen.insert(row.platform_id))
            .map(|(row, name)| outcome_from_row(row, name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DbContext;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup_test_db() -> (DieselHistoryRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        (ctx.history(), dir)
    }

    async fn netflix_id(repo: &DieselHistoryRepository) -> i32 {
        repo.find_platform("Netflix").await.unwrap().unwrap().id
    }

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_find_platform() {
        let (repo, _dir) = setup_test_db().await;

        let netflix = repo.find_platform("Netflix").await.unwrap().unwrap();
        assert_eq!(netflix.color, "#E50914");
        assert!(repo.find_platform("Quibi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_refreshes_duration() {
        let (repo, _dir) = setup_test_db().await;
        let id = netflix_id(&repo).await;

        let mut record = ActivityRecord::new(id, "Arrival", None, jan(5), 105);
        repo.upsert_record(&record).await.unwrap();
        record.duration_minutes = 116;
        repo.upsert_record(&record).await.unwrap();

        assert_eq!(repo.count_records(id).await.unwrap(), 1);
        let stored = repo.list_history(id, 10).await.unwrap();
        assert_eq!(stored[0].record.duration_minutes, 116);
    }

    #[tokio::test]
    async fn test_upsert_same_event_twice_keeps_one_row() {
        let (repo, _dir) = setup_test_db().await;
        let id = netflix_id(&repo).await;

        for _ in 0..2 {
            for day in 1..=3 {
                let record = ActivityRecord::new(id, "Dark", Some("S01E01".into()), jan(day), 40);
                repo.upsert_record(&record).await.unwrap();
            }
        }

        assert_eq!(repo.count_records(id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_record_exists_matches_episode_label() {
        let (repo, _dir) = setup_test_db().await;
        let id = netflix_id(&repo).await;

        let record = ActivityRecord::new(
            id,
            "Stranger Things",
            Some("Season 1: Chapter One".into()),
            jan(15),
            40,
        );
        repo.upsert_record(&record).await.unwrap();
        let movie = ActivityRecord::new(id, "Arrival", Some(String::new()), jan(16), 105);
        repo.upsert_record(&movie).await.unwrap();

        assert!(repo
            .record_exists(id, "Stranger Things", "Season 1: Chapter One", jan(15))
            .await
            .unwrap());
        assert!(!repo
            .record_exists(id, "Stranger Things", "Season 1: Chapter Two", jan(15))
            .await
            .unwrap());
        assert!(!repo
            .record_exists(id, "Stranger Things", "Season 1: Chapter One", jan(14))
            .await
            .unwrap());
        assert!(repo.record_exists(id, "Arrival", "", jan(16)).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_day_episodes_share_one_event() {
        let (repo, _dir) = setup_test_db().await;
        let id = netflix_id(&repo).await;

        let episode = ActivityRecord::new(id, "Dark", Some("Season 1: Secrets".into()), jan(15), 40);
        repo.upsert_record(&episode).await.unwrap();
        let episode = ActivityRecord::new(id, "Dark", Some("Season 1: Lies".into()), jan(15), 40);
        repo.upsert_record(&episode).await.unwrap();

        assert_eq!(repo.count_records(id).await.unwrap(), 1);
        assert!(!repo
            .record_exists(id, "Dark", "Season 1: Secrets", jan(15))
            .await
            .unwrap());
        assert!(repo.event_exists(id, "Dark", jan(15)).await.unwrap());
        assert!(repo
            .already_stored(id, "Dark", "Season 1: Secrets", jan(15))
            .await
            .unwrap());
        assert!(!repo.already_stored(id, "Dark", "", jan(16)).await.unwrap());
    }

    #[tokio::test]
    async fn test_subsecond_timestamps_match() {
        let (repo, _dir) = setup_test_db().await;
        let id = netflix_id(&repo).await;

        let watched = jan(3) + chrono::Duration::milliseconds(400);
        repo.upsert_record(&ActivityRecord::new(id, "Arrival", None, watched, 105))
            .await
            .unwrap();

        assert!(repo.record_exists(id, "Arrival", "", jan(3)).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_runs_one_per_platform() {
        let (repo, _dir) = setup_test_db().await;
        let netflix = netflix_id(&repo).await;
        let amazon = repo.find_platform("Amazon Video").await.unwrap().unwrap().id;

        repo.append_run_outcome(&RunOutcome::failed(netflix, "Netflix", jan(1), "timeout"))
            .await
            .unwrap();
        repo.append_run_outcome(&RunOutcome::success(netflix, "Netflix", jan(2), 12))
            .await
            .unwrap();
        repo.append_run_outcome(&RunOutcome::failed(amazon, "Amazon Video", jan(1), "no cookies"))
            .await
            .unwrap();

        let latest = repo.latest_runs().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].platform, "Netflix");
        assert!(latest[0].is_success());
        assert_eq!(latest[0].items_scraped, 12);
        assert_eq!(latest[1].platform, "Amazon Video");
        assert_eq!(latest[1].error_message.as_deref(), Some("no cookies"));
    }

    #[tokio::test]
    async fn test_platform_stats_window() {
        let (repo, _dir) = setup_test_db().await;
        let id = netflix_id(&repo).await;

        repo.upsert_record(&ActivityRecord::new(id, "Arrival", None, jan(5), 105))
            .await
            .unwrap();
        repo.upsert_record(&ActivityRecord::new(id, "Dark", Some("S01E01".into()), jan(6), 40))
            .await
            .unwrap();
        repo.upsert_record(&ActivityRecord::new(id, "Old", None, jan(1) - chrono::Duration::days(30), 90))
            .await
            .unwrap();

        let stats = repo.platform_stats(jan(1), jan(31)).await.unwrap();
        let netflix = stats.iter().find(|s| s.name == "Netflix").unwrap();
        assert_eq!(netflix.total_minutes, 145);
        assert_eq!(netflix.total_records, 2);
        assert_eq!(netflix.last_watched, Some(jan(6)));
        assert_eq!(stats[0].name, "Netflix");
    }

    #[tokio::test]
    async fn test_set_platform_enabled() {
        let (repo, _dir) = setup_test_db().await;

        assert!(repo.set_platform_enabled("Peacock", false).await.unwrap());
        assert!(!repo.find_platform("Peacock").await.unwrap().unwrap().enabled);
        assert!(!repo.set_platform_enabled("Quibi", false).await.unwrap());
    }
}
