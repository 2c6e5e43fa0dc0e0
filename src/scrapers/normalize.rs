//! Date, title and duration normalization.
//!
//! Platforms render watch dates in several shapes: relative markers
//! ("Today", "Yesterday"), month-day headers without a year ("Oct 27"),
//! numeric dates ("1/15/25", "2025-01-15") and spelled-out dates
//! ("January 15, 2025"). Candidates are tried in a fixed order and the
//! first success wins.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Month, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use tracing::warn;

use super::error::ItemError;

/// Numeric and spelled-out layouts, in priority order.
const DATE_LAYOUTS: &[&str] = &[
    "%m/%d/%y", // 1/15/25
    "%m/%d/%Y", // 01/15/2025, 1/15/2025
    "%Y-%m-%d", // 2025-01-15
    "%b %d, %Y", // Jan 15, 2025
    "%B %d, %Y", // January 15, 2025
];

static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)\.?\s+(\d{1,2})$").unwrap());

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*([AP]M)").unwrap());

static EPISODE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[Ss](\d+):?\s*[Ee](\d+)\b").unwrap());

/// Parses platform date text relative to a fixed "now".
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    now: NaiveDateTime,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new(chrono::Local::now().naive_local())
    }
}

impl DateNormalizer {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// Parse a date in any supported shape.
    pub fn parse_date(&self, text: &str) -> Result<NaiveDate, ItemError> {
        let text = clean(text);
        let text = text.trim();
        if text.is_empty() {
            return Err(ItemError::Parse("empty date".to_string()));
        }

        match text.to_ascii_lowercase().as_str() {
            "today" => return Ok(self.today()),
            "yesterday" => return Ok(self.today() - Duration::days(1)),
            _ => {}
        }

        for layout in DATE_LAYOUTS {
            if let Ok(date) = NaiveDate::parse_from_str(text, layout) {
                return Ok(date);
            }
        }

        if let Some(date) = self.parse_month_day(text) {
            return Ok(date);
        }

        Err(ItemError::Parse(format!("unable to parse date '{}'", text)))
    }

    /// A month-day header with no year. The current year is assumed unless
    /// that date is in the future or does not exist, in which case it is last year.
    fn parse_month_day(&self, text: &str) -> Option<NaiveDate> {
        let caps = MONTH_DAY.captures(text)?;
        let month: Month = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;

        let year = self.today().year();
        let month = month.number_from_month();
        match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) if date <= self.today() => Some(date),
            // In the future, or Feb 29 outside a leap year.
            _ => NaiveDate::from_ymd_opt(year - 1, month, day),
        }
    }

    /// Combine a date header ("Yesterday", "Oct 27") with a clock time
    /// ("6:00 PM • Details"). A missing or unreadable time means midnight.
    pub fn parse_date_and_time(
        &self,
        date_header: &str,
        time_text: &str,
    ) -> Result<NaiveDateTime, ItemError> {
        let date = self.parse_date(date_header)?;
        let time = parse_clock_time(time_text).unwrap_or(NaiveTime::MIN);
        Ok(date.and_time(time))
    }
}

/// Replace the narrow no-break spaces some feeds use between time and meridiem.
fn clean(text: &str) -> String {
    text.replace(['\u{202F}', '\u{00A0}'], " ")
}

/// Parse a 12-hour clock time, ignoring anything after a bullet.
pub fn parse_clock_time(text: &str) -> Option<NaiveTime> {
    let text = clean(text);
    let text = text.split('•').next().unwrap_or_default();
    let caps = CLOCK_TIME.captures(text)?;

    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let pm = caps[3].eq_ignore_ascii_case("PM");
    if pm && hour != 12 {
        hour += 12;
    }
    if !pm && hour == 12 {
        hour = 0;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Convert a wall-clock time to the stored UTC timestamp.
pub fn to_timestamp(dt: NaiveDateTime) -> DateTime<Utc> {
    dt.and_utc()
}

/// Use the parsed timestamp, or log and substitute the Unix epoch.
pub fn timestamp_or_default(
    parsed: Result<NaiveDateTime, ItemError>,
    title: &str,
) -> DateTime<Utc> {
    match parsed {
        Ok(dt) => to_timestamp(dt),
        Err(e) => {
            warn!("{} for '{}'; using default timestamp", e, title);
            DateTime::UNIX_EPOCH
        }
    }
}

/// Split "Show: Season 1: Chapter One" into ("Show", Some("Season 1: Chapter One")).
pub fn split_title(raw: &str) -> (String, Option<String>) {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((title, rest)) => {
            let rest = rest.trim();
            (
                title.trim().to_string(),
                (!rest.is_empty()).then(|| rest.to_string()),
            )
        }
        None => (raw.to_string(), None),
    }
}

/// Rewrite "S1:E5" style codes inside a label as "S01E05".
pub fn normalize_episode_code(label: &str) -> String {
    EPISODE_CODE
        .replace_all(label, |caps: &regex::Captures<'_>| {
            let season: u32 = caps[1].parse().unwrap_or(0);
            let episode: u32 = caps[2].parse().unwrap_or(0);
            format!("S{:02}E{:02}", season, episode)
        })
        .into_owned()
}

/// Fixed duration estimates used when a source has no runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationHeuristic {
    pub episode_minutes: i32,
    pub feature_minutes: i32,
}

impl DurationHeuristic {
    /// Streaming catalogue: TV episodes and films.
    pub const CATALOGUE: Self = Self {
        episode_minutes: 40,
        feature_minutes: 105,
    };

    /// Short-form video feeds.
    pub const SHORT_FORM: Self = Self {
        episode_minutes: 45,
        feature_minutes: 60,
    };

    pub fn estimate(&self, episode_info: Option<&str>) -> i32 {
        match episode_info {
            Some(e) if !e.trim().is_empty() => self.episode_minutes,
            _ => self.feature_minutes,
        }
    }
}

/// Catalogue estimate: 40 minutes with an episode label, 105 without.
pub fn estimate_duration(episode_info: Option<&str>) -> i32 {
    DurationHeuristic::CATALOGUE.estimate(episode_info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateNormalizer {
        DateNormalizer::new(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_todays_date_in_every_shape() {
        let norm = at(2025, 1, 5);
        let today = ymd(2025, 1, 5);
        for text in [
            "Today",
            "Jan 5, 2025",
            "January 5, 2025",
            "1/5/25",
            "01/05/2025",
            "1/5/2025",
            "2025-01-05",
            "Jan 5",
            "January 5",
        ] {
            assert_eq!(norm.parse_date(text).unwrap(), today, "{}", text);
        }
        assert_eq!(norm.parse_date("Yesterday").unwrap(), ymd(2025, 1, 4));
        assert_eq!(norm.parse_date("  yesterday ").unwrap(), ymd(2025, 1, 4));
    }

    #[test]
    fn test_two_digit_year() {
        let norm = at(2025, 6, 1);
        assert_eq!(norm.parse_date("1/15/25").unwrap(), ymd(2025, 1, 15));
        assert_eq!(norm.parse_date("12/31/24").unwrap(), ymd(2024, 12, 31));
    }

    #[test]
    fn test_month_day_in_future_is_last_year() {
        let norm = at(2025, 1, 5);
        assert_eq!(norm.parse_date("Dec 28").unwrap(), ymd(2024, 12, 28));
        assert_eq!(norm.parse_date("Oct 27").unwrap(), ymd(2024, 10, 27));
        assert_eq!(norm.parse_date("Jan 2").unwrap(), ymd(2025, 1, 2));
    }

    #[test]
    fn test_unparseable_date_is_parse_error() {
        let norm = at(2025, 1, 5);
        assert!(matches!(norm.parse_date("not-a-date"), Err(ItemError::Parse(_))));
        assert!(matches!(norm.parse_date(""), Err(ItemError::Parse(_))));
        assert!(norm.parse_date("Smarch 3").is_err());
    }

    #[test]
    fn test_clock_time() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(parse_clock_time("6:00 PM • Details"), Some(t(18, 0)));
        assert_eq!(parse_clock_time("6:05\u{202F}AM"), Some(t(6, 5)));
        assert_eq!(parse_clock_time("12:15 AM"), Some(t(0, 15)));
        assert_eq!(parse_clock_time("12:15 PM"), Some(t(12, 15)));
        assert_eq!(parse_clock_time("Details"), None);
    }

    #[test]
    fn test_date_and_time() {
        let norm = at(2025, 1, 5);
        let dt = norm.parse_date_and_time("Yesterday", "9:30 PM • Details").unwrap();
        assert_eq!(dt, ymd(2025, 1, 4).and_hms_opt(21, 30, 0).unwrap());

        let midnight = norm.parse_date_and_time("Oct 27", "").unwrap();
        assert_eq!(midnight, ymd(2024, 10, 27).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_default_timestamp_on_failure() {
        let norm = at(2025, 1, 5);
        let ts = timestamp_or_default(norm.parse_date_and_time("garbage", "1:00 PM"), "x");
        assert_eq!(ts, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_split_title_at_first_colon() {
        assert_eq!(
            split_title("Stranger Things: Season 1: Chapter One"),
            (
                "Stranger Things".to_string(),
                Some("Season 1: Chapter One".to_string())
            )
        );
        assert_eq!(split_title("Arrival"), ("Arrival".to_string(), None));
        assert_eq!(split_title("Odd: "), ("Odd".to_string(), None));
    }

    #[test]
    fn test_episode_code_normalization() {
        assert_eq!(normalize_episode_code("S1:E5"), "S01E05");
        assert_eq!(normalize_episode_code("s2 e10"), "S02E10");
        assert_eq!(normalize_episode_code("Season 1: Chapter One"), "Season 1: Chapter One");
        assert_eq!(normalize_episode_code("Limited Series: S1:E3"), "Limited Series: S01E03");
        assert_eq!(normalize_episode_code("Press 1 E2"), "Press 1 E2");
    }

    #[test]
    fn test_leap_day_outside_leap_year_is_last_leap_year() {
        let norm = at(2025, 3, 10);
        assert_eq!(norm.parse_date("Feb 29").unwrap(), ymd(2024, 2, 29));

        let norm = at(2024, 3, 10);
        assert_eq!(norm.parse_date("Feb 29").unwrap(), ymd(2024, 2, 29));
    }

    #[test]
    fn test_duration_estimates() {
        assert_eq!(estimate_duration(Some("Season 1: Chapter One")), 40);
        assert_eq!(estimate_duration(None), 105);
        assert_eq!(estimate_duration(Some("  ")), 105);
        assert_eq!(DurationHeuristic::SHORT_FORM.estimate(None), 60);
    }
}
