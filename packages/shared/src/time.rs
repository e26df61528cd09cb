//! Time-related utilities with clock abstraction for testability.
//!
//! Timestamps travel as UTC (`DateTime<Utc>`); display helpers render them in
//! JST, the timezone the client is operated in.

use chrono::{DateTime, Duration, FixedOffset, Utc};

/// JST is UTC+9
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get the current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given instant
    pub fn new(fixed_time: DateTime<Utc>) -> Self {
        Self { fixed_time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap()
}

/// Convert a UTC instant to JST RFC 3339 format
pub fn to_jst_rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&jst()).to_rfc3339()
}

/// Format a timestamp for a message bubble: "now", "5m ago", "2h ago",
/// "yesterday", "3d ago", then the calendar date.
pub fn format_message_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - timestamp).num_minutes();

    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        match minutes / 1440 {
            1 => "yesterday".to_string(),
            days if days < 7 => format!("{}d ago", days),
            _ => timestamp.with_timezone(&jst()).format("%Y/%m/%d").to_string(),
        }
    }
}

/// Shorter variant of [`format_message_time`] for the conversation list.
pub fn format_conversation_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - timestamp).num_minutes();

    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else {
        match minutes / 1440 {
            1 => "yesterday".to_string(),
            days if days < 7 => format!("{}d", days),
            _ => timestamp.with_timezone(&jst()).format("%b %-d").to_string(),
        }
    }
}

/// Full date and time, e.g. "January 5, 2023 09:30"
pub fn format_full_date_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&jst())
        .format("%B %-d, %Y %H:%M")
        .to_string()
}

/// Check whether `timestamp` falls on the same JST calendar day as `now`
pub fn is_today(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    timestamp.with_timezone(&jst()).date_naive() == now.with_timezone(&jst()).date_naive()
}

/// Check whether `timestamp` falls on the JST calendar day before `now`
pub fn is_yesterday(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let yesterday = now - Duration::days(1);
    timestamp.with_timezone(&jst()).date_naive() == yesterday.with_timezone(&jst()).date_naive()
}

/// Verbose relative time used for presence ("last seen 5 minutes ago").
pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - timestamp).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }

    let days = hours / 24;
    if days < 7 {
        return plural(days, "day");
    }

    let weeks = days / 7;
    if weeks < 4 {
        return plural(weeks, "week");
    }

    let months = days / 30;
    if months < 12 {
        return plural(months, "month");
    }

    plural(days / 365, "year")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        // 2023-01-10 03:00:00 UTC (12:00 JST)
        Utc.with_ymd_and_hms(2023, 1, 10, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_system_clock_returns_increasing_timestamps() {
        // テスト項目: SystemClock が呼び出すたびに増加するタイムスタンプを返す
        // given (前提条件):
        let clock = SystemClock;

        // when (操作):
        let t1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let t2 = clock.now();

        // then (期待する結果):
        assert!(t2 >= t1);
    }

    #[test]
    fn test_fixed_clock_returns_fixed_timestamp() {
        // テスト項目: FixedClock が固定されたタイムスタンプを返す
        // given (前提条件):
        let clock = FixedClock::new(base());

        // when (操作):
        let t1 = clock.now();
        let t2 = clock.now();

        // then (期待する結果):
        assert_eq!(t1, base());
        assert_eq!(t2, base());
    }

    #[test]
    fn test_to_jst_rfc3339_format() {
        // テスト項目: UTC の時刻が JST の RFC 3339 形式に変換される
        // given (前提条件):
        let timestamp = Utc.with_ymd_and_hms(2022, 12, 31, 15, 0, 0).unwrap();

        // when (操作):
        let result = to_jst_rfc3339(timestamp);

        // then (期待する結果):
        assert!(result.starts_with("2023-01-01T00:00:00"));
        assert!(result.contains("+09:00"));
    }

    #[test]
    fn test_format_message_time_buckets() {
        // テスト項目: 経過時間に応じてメッセージ時刻の表記が切り替わる
        // given (前提条件):
        let now = base();

        // when (操作) / then (期待する結果):
        assert_eq!(format_message_time(now - Duration::seconds(30), now), "now");
        assert_eq!(format_message_time(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_message_time(now - Duration::minutes(125), now), "2h ago");
        assert_eq!(format_message_time(now - Duration::hours(25), now), "yesterday");
        assert_eq!(format_message_time(now - Duration::days(3), now), "3d ago");
        assert_eq!(format_message_time(now - Duration::days(9), now), "2023/01/01");
    }

    #[test]
    fn test_format_message_time_future_timestamp_is_now() {
        // テスト項目: 未来のタイムスタンプ（時計のずれ）は "now" と表示される
        // given (前提条件):
        let now = base();

        // when (操作):
        let result = format_message_time(now + Duration::minutes(3), now);

        // then (期待する結果):
        assert_eq!(result, "now");
    }

    #[test]
    fn test_format_conversation_time_short_forms() {
        // テスト項目: 会話一覧向けの短い表記が返される
        // given (前提条件):
        let now = base();

        // when (操作) / then (期待する結果):
        assert_eq!(format_conversation_time(now - Duration::minutes(7), now), "7m");
        assert_eq!(format_conversation_time(now - Duration::hours(3), now), "3h");
        assert_eq!(format_conversation_time(now - Duration::days(2), now), "2d");
        assert_eq!(format_conversation_time(now - Duration::days(30), now), "Dec 11");
    }

    #[test]
    fn test_time_ago_pluralization() {
        // テスト項目: time_ago が単数形と複数形を正しく使い分ける
        // given (前提条件):
        let now = base();

        // when (操作) / then (期待する結果):
        assert_eq!(time_ago(now - Duration::seconds(10), now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(time_ago(now - Duration::days(2), now), "2 days ago");
        assert_eq!(time_ago(now - Duration::days(14), now), "2 weeks ago");
        assert_eq!(time_ago(now - Duration::days(60), now), "2 months ago");
        assert_eq!(time_ago(now - Duration::days(400), now), "1 year ago");
    }

    #[test]
    fn test_is_today_and_is_yesterday_use_jst_calendar() {
        // テスト項目: 日付判定が JST の暦日で行われる
        // given (前提条件):
        let now = base(); // 2023-01-10 12:00 JST
        let early_today = Utc.with_ymd_and_hms(2023, 1, 9, 15, 30, 0).unwrap(); // 00:30 JST
        let late_yesterday = Utc.with_ymd_and_hms(2023, 1, 9, 14, 30, 0).unwrap(); // 23:30 JST

        // when (操作) / then (期待する結果):
        assert!(is_today(early_today, now));
        assert!(!is_today(late_yesterday, now));
        assert!(is_yesterday(late_yesterday, now));
    }

    #[test]
    fn test_format_full_date_time() {
        // テスト項目: 完全な日時表記が JST で返される
        // given (前提条件):
        let timestamp = Utc.with_ymd_and_hms(2023, 1, 5, 0, 30, 0).unwrap();

        // when (操作):
        let result = format_full_date_time(timestamp);

        // then (期待する結果):
        assert_eq!(result, "January 5, 2023 09:30");
    }
}
