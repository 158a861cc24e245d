use chrono::{Datelike, NaiveDate};

use crate::domain::{CalendarTotals, ContributionCalendar, ContributionDay, StreakMetrics};

pub fn derive_metrics(calendar: &ContributionCalendar, today: NaiveDate) -> StreakMetrics {
    let (current_streak, longest_streak) = streaks(&calendar.days, today);
    StreakMetrics {
        total_contributions: total_contributions(&calendar.totals, today.year()),
        current_streak,
        longest_streak,
    }
}

/// Current-year total, else the trailing-year total, else zero. A year key
/// that is present wins even when its value is zero.
pub fn total_contributions(totals: &CalendarTotals, year: i32) -> u64 {
    totals
        .by_year
        .get(&year)
        .copied()
        .or(totals.last_year)
        .unwrap_or(0)
}

/// Returns `(current, longest)`.
///
/// The walk runs newest to oldest over entries dated on or before `today`;
/// anything later is dropped wherever it appears. Runs are counted by
/// position in the sequence, so a calendar gap does not break a run. The
/// current streak is the run touching the newest remaining entry and ends
/// at the first zero-count day.
pub fn streaks(days: &[ContributionDay], today: NaiveDate) -> (u32, u32) {
    let mut current = 0;
    let mut longest = 0;
    let mut run = 0;
    let mut current_open = true;

    for day in days.iter().rev().filter(|day| day.date <= today) {
        if day.count > 0 {
            run += 1;
            longest = longest.max(run);
            if current_open {
                current = run;
            }
        } else {
            run = 0;
            current_open = false;
        }
    }

    (current, longest)
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
