use chrono::{DateTime, Utc};

use crate::domain::{ActivityEvent, RecentEvent};

pub const PUSH_EVENT_KIND: &str = "PushEvent";
pub const MAX_RECENT_EVENTS: usize = 5;

const AGE_UNITS: &[(i64, &str)] = &[
    (31_536_000, "y"),
    (2_592_000, "mo"),
    (86_400, "d"),
    (3_600, "h"),
    (60, "m"),
];

/// Keeps push events only, newest first, capped at [`MAX_RECENT_EVENTS`].
pub fn format_recent_events(events: &[ActivityEvent], now: DateTime<Utc>) -> Vec<RecentEvent> {
    let mut pushes: Vec<&ActivityEvent> = events
        .iter()
        .filter(|event| event.kind == PUSH_EVENT_KIND)
        .collect();
    pushes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    pushes
        .into_iter()
        .take(MAX_RECENT_EVENTS)
        .map(|event| RecentEvent {
            repository_label: short_repo_name(&event.repository).to_owned(),
            unit_count: event.unit_count.unwrap_or(0),
            relative_age: relative_age(event.created_at, now),
        })
        .collect()
}

pub fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    for (unit, suffix) in AGE_UNITS {
        let interval = seconds / unit;
        if interval >= 1 {
            return format!("{interval}{suffix} ago");
        }
    }
    "just now".to_owned()
}

fn short_repo_name(full_name: &str) -> &str {
    full_name
        .rsplit_once('/')
        .map(|(_, repo)| repo)
        .unwrap_or(full_name)
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn push(repo: &str, commits: Option<usize>, minutes_ago: i64) -> ActivityEvent {
        ActivityEvent {
            repository: repo.to_owned(),
            kind: PUSH_EVENT_KIND.to_owned(),
            unit_count: commits,
            created_at: now() - Duration::minutes(minutes_ago),
        }
    }

    fn ago(seconds: i64) -> String {
        relative_age(now() - Duration::seconds(seconds), now())
    }

    #[test]
    fn relative_age_uses_largest_whole_unit() {
        assert_eq!(ago(90), "1m ago");
        assert_eq!(ago(3_700), "1h ago");
        assert_eq!(ago(90_000), "1d ago");
        assert_eq!(ago(2_592_000 * 3), "3mo ago");
        assert_eq!(ago(31_536_000 * 2 + 5), "2y ago");
    }

    #[test]
    fn relative_age_under_a_minute_is_just_now() {
        assert_eq!(ago(0), "just now");
        assert_eq!(ago(59), "just now");
        assert_eq!(ago(-120), "just now");
    }

    #[test]
    fn only_push_events_are_kept() {
        let mut watch = push("acme/stars", Some(1), 1);
        watch.kind = "WatchEvent".to_owned();
        let events = vec![watch, push("acme/widgets", Some(2), 5)];

        let formatted = format_recent_events(&events, now());
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted[0].repository_label, "widgets");
        assert_eq!(formatted[0].unit_count, 2);
        assert_eq!(formatted[0].relative_age, "5m ago");
    }

    #[test]
    fn missing_commit_list_counts_as_zero_units() {
        let formatted = format_recent_events(&[push("acme/widgets", None, 3)], now());
        assert_eq!(formatted[0].unit_count, 0);
    }

    #[test]
    fn feed_is_capped_and_newest_first() {
        let events: Vec<ActivityEvent> = [30, 2, 400, 9, 61, 1, 3_000]
            .iter()
            .enumerate()
            .map(|(idx, minutes)| push(&format!("acme/repo-{idx}"), Some(1), *minutes))
            .collect();

        let formatted = format_recent_events(&events, now());
        let labels: Vec<&str> = formatted
            .iter()
            .map(|event| event.repository_label.as_str())
            .collect();
        assert_eq!(labels, ["repo-5", "repo-1", "repo-3", "repo-0", "repo-4"]);
    }

    #[test]
    fn unqualified_repository_name_is_kept_as_is() {
        assert_eq!(short_repo_name("widgets"), "widgets");
        assert_eq!(short_repo_name("acme/widgets"), "widgets");
    }
}
