use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// Domain data structures shared across modules.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
}

impl ContributionDay {
    pub fn new(date: NaiveDate, count: u32) -> Self {
        Self { date, count }
    }
}

/// Yearly totals as published by the calendar source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalendarTotals {
    pub by_year: BTreeMap<i32, u64>,
    pub last_year: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContributionCalendar {
    pub totals: CalendarTotals,
    /// Ascending by date, as supplied by the source.
    pub days: Vec<ContributionDay>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileSummary {
    pub repository_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityEvent {
    /// Owner-qualified name, e.g. `octocat/hello-world`.
    pub repository: String,
    pub kind: String,
    pub unit_count: Option<usize>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreakMetrics {
    pub total_contributions: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEvent {
    pub repository_label: String,
    pub unit_count: usize,
    pub relative_age: String,
}

/// One fully derived result of an acquisition cycle. Never mutated after
/// construction; a newer snapshot replaces it wholesale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub repository_count: u64,
    pub total_contributions: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub recent_events: Vec<RecentEvent>,
    #[serde(skip)]
    pub from_cache: bool,
}

impl ActivitySnapshot {
    pub fn assemble(
        profile: ProfileSummary,
        metrics: StreakMetrics,
        recent_events: Vec<RecentEvent>,
    ) -> Self {
        Self {
            repository_count: profile.repository_count,
            total_contributions: metrics.total_contributions,
            current_streak: metrics.current_streak,
            longest_streak: metrics.longest_streak,
            recent_events,
            from_cache: false,
        }
    }

    pub fn served_from_cache(self) -> Self {
        Self {
            from_cache: true,
            ..self
        }
    }
}
