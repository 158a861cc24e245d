use std::{fmt, sync::mpsc, thread};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    domain::{ActivityEvent, ActivitySnapshot, ContributionCalendar, ProfileSummary},
    feed::format_recent_events,
    github::FetchError,
    metrics::derive_metrics,
    storage::{CachedSnapshot, SnapshotCache},
};

/// The three read-only remote calls an acquisition cycle depends on.
/// Implementations are shared across the fetch threads.
pub trait ActivitySource: Sync {
    fn fetch_profile(&self) -> Result<ProfileSummary, FetchError>;
    fn fetch_calendar(&self) -> Result<ContributionCalendar, FetchError>;
    fn fetch_events(&self) -> Result<Vec<ActivityEvent>, FetchError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Profile,
    Calendar,
    Events,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Endpoint::Profile => "profile",
            Endpoint::Calendar => "contribution calendar",
            Endpoint::Events => "recent activity",
        })
    }
}

#[derive(Debug, Error)]
#[error("Failed to fetch {endpoint} data: {source}")]
pub struct AcquisitionFailure {
    pub endpoint: Endpoint,
    pub source: FetchError,
}

impl AcquisitionFailure {
    fn new(endpoint: Endpoint, source: FetchError) -> Self {
        Self { endpoint, source }
    }
}

pub type AcquisitionOutcome = Result<ActivitySnapshot, AcquisitionFailure>;

/// Serves a fresh cached snapshot, or fetches, derives and caches a new one.
///
/// Nothing is written to the cache unless all three remote calls succeed.
pub fn get_activity_snapshot<S, C>(
    source: &S,
    cache: &C,
    now: DateTime<Utc>,
    ttl_ms: i64,
) -> AcquisitionOutcome
where
    S: ActivitySource + ?Sized,
    C: SnapshotCache + ?Sized,
{
    let now_ms = now.timestamp_millis();
    match cache.load() {
        Ok(Some(entry)) if entry.is_fresh(now_ms, ttl_ms) => {
            tracing::info!(cached_at_ms = entry.cached_at_ms, "serving activity snapshot from cache");
            return Ok(entry.snapshot.served_from_cache());
        }
        Ok(Some(entry)) => {
            tracing::debug!(cached_at_ms = entry.cached_at_ms, "cached snapshot expired");
        }
        Ok(None) => tracing::debug!("no cached snapshot"),
        Err(err) => tracing::warn!(error = %err, "snapshot cache unreadable; treating as a miss"),
    }

    tracing::info!("fetching activity data");
    let (profile, calendar, events) = fetch_all(source).inspect_err(|failure| {
        tracing::error!(endpoint = %failure.endpoint, error = %failure.source, "acquisition failed");
    })?;

    let metrics = derive_metrics(&calendar, now.date_naive());
    let recent_events = format_recent_events(&events, now);
    let snapshot = ActivitySnapshot::assemble(profile, metrics, recent_events);

    let entry = CachedSnapshot {
        snapshot: snapshot.clone(),
        cached_at_ms: now_ms,
    };
    if let Err(err) = cache.store(&entry) {
        tracing::warn!(error = %err, "failed to persist activity snapshot");
    }

    Ok(snapshot)
}

enum Part {
    Profile(Result<ProfileSummary, FetchError>),
    Calendar(Result<ContributionCalendar, FetchError>),
    Events(Result<Vec<ActivityEvent>, FetchError>),
}

/// Runs the three calls concurrently and waits for all of them. The first
/// failure to arrive is the one reported.
fn fetch_all<S>(
    source: &S,
) -> Result<(ProfileSummary, ContributionCalendar, Vec<ActivityEvent>), AcquisitionFailure>
where
    S: ActivitySource + ?Sized,
{
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        let handles = [
            {
                let tx = tx.clone();
                scope.spawn(move || {
                    let _ = tx.send(Part::Profile(source.fetch_profile()));
                })
            },
            {
                let tx = tx.clone();
                scope.spawn(move || {
                    let _ = tx.send(Part::Calendar(source.fetch_calendar()));
                })
            },
            {
                let tx = tx.clone();
                scope.spawn(move || {
                    let _ = tx.send(Part::Events(source.fetch_events()));
                })
            },
        ];
        drop(tx);

        let mut profile = None;
        let mut calendar = None;
        let mut events = None;
        let mut first_failure = None;

        // Ends once every worker has sent or dropped its sender.
        for part in rx {
            let failure = match part {
                Part::Profile(Ok(value)) => {
                    profile = Some(value);
                    None
                }
                Part::Calendar(Ok(value)) => {
                    calendar = Some(value);
                    None
                }
                Part::Events(Ok(value)) => {
                    events = Some(value);
                    None
                }
                Part::Profile(Err(err)) => Some(AcquisitionFailure::new(Endpoint::Profile, err)),
                Part::Calendar(Err(err)) => Some(AcquisitionFailure::new(Endpoint::Calendar, err)),
                Part::Events(Err(err)) => Some(AcquisitionFailure::new(Endpoint::Events, err)),
            };
            if first_failure.is_none() {
                first_failure = failure;
            }
        }

        // Joining here keeps a panicking worker from re-panicking the scope.
        for handle in handles {
            let _ = handle.join();
        }

        if let Some(failure) = first_failure {
            return Err(failure);
        }
        let gone = |endpoint| AcquisitionFailure::new(endpoint, FetchError::BackgroundWorkerGone);
        Ok((
            profile.ok_or_else(|| gone(Endpoint::Profile))?,
            calendar.ok_or_else(|| gone(Endpoint::Calendar))?,
            events.ok_or_else(|| gone(Endpoint::Events))?,
        ))
    })
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration as StdDuration,
    };

    use chrono::{Duration, NaiveDate, TimeZone};

    use super::*;
    use crate::{
        domain::{ContributionDay, RecentEvent},
        storage::{CacheError, MemoryCache, SNAPSHOT_TTL_MS},
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[derive(Default)]
    struct ScriptedSource {
        fail_profile: bool,
        fail_calendar: bool,
        fail_events: bool,
        profile_delay: Option<StdDuration>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn outcome<T>(&self, fail: bool, value: T) -> Result<T, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(FetchError::Status {
                    url: "http://test.invalid".into(),
                    status: 503,
                })
            } else {
                Ok(value)
            }
        }
    }

    impl ActivitySource for ScriptedSource {
        fn fetch_profile(&self) -> Result<ProfileSummary, FetchError> {
            if let Some(delay) = self.profile_delay {
                thread::sleep(delay);
            }
            self.outcome(self.fail_profile, ProfileSummary { repository_count: 7 })
        }

        fn fetch_calendar(&self) -> Result<ContributionCalendar, FetchError> {
            let today = NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date");
            let mut calendar = ContributionCalendar {
                days: [1, 1, 0, 1, 1]
                    .iter()
                    .enumerate()
                    .map(|(idx, count)| {
                        ContributionDay::new(today - Duration::days(4 - idx as i64), *count)
                    })
                    .collect(),
                ..ContributionCalendar::default()
            };
            calendar.totals.by_year.insert(2026, 88);
            self.outcome(self.fail_calendar, calendar)
        }

        fn fetch_events(&self) -> Result<Vec<ActivityEvent>, FetchError> {
            let events = (0..8)
                .map(|idx| ActivityEvent {
                    repository: format!("acme/repo-{idx}"),
                    kind: "PushEvent".into(),
                    unit_count: Some(idx),
                    created_at: now() - Duration::hours(idx as i64 + 1),
                })
                .collect();
            self.outcome(self.fail_events, events)
        }
    }

    /// Cache whose reads and/or writes fail with an I/O error.
    #[derive(Default)]
    struct BrokenCache {
        fail_load: bool,
        fail_store: bool,
        store_attempts: AtomicUsize,
    }

    impl SnapshotCache for BrokenCache {
        fn load(&self) -> Result<Option<CachedSnapshot>, CacheError> {
            if self.fail_load {
                return Err(std::io::Error::other("disk unreadable").into());
            }
            Ok(None)
        }

        fn store(&self, _entry: &CachedSnapshot) -> Result<(), CacheError> {
            self.store_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_store {
                return Err(std::io::Error::other("disk full").into());
            }
            Ok(())
        }
    }

    fn cached(cached_at: DateTime<Utc>) -> CachedSnapshot {
        CachedSnapshot {
            snapshot: ActivitySnapshot {
                repository_count: 3,
                total_contributions: 10,
                current_streak: 1,
                longest_streak: 2,
                recent_events: vec![RecentEvent {
                    repository_label: "old".into(),
                    unit_count: 1,
                    relative_age: "3h ago".into(),
                }],
                from_cache: false,
            },
            cached_at_ms: cached_at.timestamp_millis(),
        }
    }

    #[test]
    fn fresh_acquisition_derives_and_caches_snapshot() {
        let source = ScriptedSource::default();
        let cache = MemoryCache::default();

        let snapshot =
            get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS).expect("snapshot");

        assert!(!snapshot.from_cache);
        assert_eq!(snapshot.repository_count, 7);
        assert_eq!(snapshot.total_contributions, 88);
        assert_eq!(snapshot.current_streak, 2);
        assert_eq!(snapshot.longest_streak, 2);
        assert_eq!(snapshot.recent_events.len(), 5);
        assert_eq!(snapshot.recent_events[0].repository_label, "repo-0");
        assert_eq!(snapshot.recent_events[0].relative_age, "1h ago");
        assert_eq!(source.calls(), 3);

        let stored = cache.current().expect("cache entry");
        assert_eq!(stored.snapshot, snapshot);
        assert_eq!(stored.cached_at_ms, now().timestamp_millis());
    }

    #[test]
    fn cached_snapshot_within_ttl_skips_network() {
        let source = ScriptedSource::default();
        let entry = cached(now() - Duration::hours(5));
        let cache = MemoryCache::with_entry(entry.clone());

        let snapshot =
            get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS).expect("snapshot");

        assert!(snapshot.from_cache);
        assert_eq!(snapshot, entry.snapshot.served_from_cache());
        assert_eq!(source.calls(), 0);
        assert_eq!(cache.writes(), 0);
    }

    #[test]
    fn expired_snapshot_triggers_fresh_acquisition() {
        let source = ScriptedSource::default();
        let cache = MemoryCache::with_entry(cached(now() - Duration::hours(6)));

        let snapshot =
            get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS).expect("snapshot");

        assert!(!snapshot.from_cache);
        assert_eq!(source.calls(), 3);
        assert_eq!(cache.writes(), 1);
    }

    #[test]
    fn write_then_read_within_ttl_round_trips() {
        let source = ScriptedSource::default();
        let cache = MemoryCache::default();

        let fresh =
            get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS).expect("snapshot");
        let later = now() + Duration::minutes(30);
        let again =
            get_activity_snapshot(&source, &cache, later, SNAPSHOT_TTL_MS).expect("snapshot");

        assert_eq!(again, fresh.served_from_cache());
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn any_single_failure_fails_acquisition_without_cache_write() {
        let cases = [
            (
                ScriptedSource {
                    fail_profile: true,
                    ..ScriptedSource::default()
                },
                Endpoint::Profile,
            ),
            (
                ScriptedSource {
                    fail_calendar: true,
                    ..ScriptedSource::default()
                },
                Endpoint::Calendar,
            ),
            (
                ScriptedSource {
                    fail_events: true,
                    ..ScriptedSource::default()
                },
                Endpoint::Events,
            ),
        ];

        for (source, expected) in cases {
            let cache = MemoryCache::default();
            let result = get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS);

            let failure = result.expect_err("acquisition should fail");
            assert_eq!(failure.endpoint, expected);
            assert!(matches!(failure.source, FetchError::Status { status: 503, .. }));
            assert_eq!(cache.writes(), 0);
            assert!(cache.current().is_none());
        }
    }

    #[test]
    fn earliest_failure_is_reported_after_all_calls_settle() {
        let source = ScriptedSource {
            fail_profile: true,
            fail_events: true,
            profile_delay: Some(StdDuration::from_millis(150)),
            ..ScriptedSource::default()
        };
        let cache = MemoryCache::default();

        let failure = get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS)
            .expect_err("acquisition should fail");

        assert_eq!(failure.endpoint, Endpoint::Events);
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn failure_keeps_stale_entry_untouched() {
        let source = ScriptedSource {
            fail_calendar: true,
            ..ScriptedSource::default()
        };
        let stale = cached(now() - Duration::days(2));
        let cache = MemoryCache::with_entry(stale.clone());

        assert!(get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS).is_err());
        assert_eq!(cache.current(), Some(stale));
    }

    #[test]
    fn failure_message_names_the_endpoint() {
        let failure = AcquisitionFailure::new(Endpoint::Calendar, FetchError::BackgroundWorkerGone);
        assert_eq!(
            failure.to_string(),
            "Failed to fetch contribution calendar data: Background worker disconnected before returning a result"
        );
    }

    #[test]
    fn unreadable_cache_is_treated_as_a_miss() {
        let source = ScriptedSource::default();
        let cache = BrokenCache {
            fail_load: true,
            ..BrokenCache::default()
        };

        let snapshot =
            get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS).expect("snapshot");

        assert!(!snapshot.from_cache);
        assert_eq!(snapshot.repository_count, 7);
        assert_eq!(source.calls(), 3);
        assert_eq!(cache.store_attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_cache_write_still_returns_fresh_snapshot() {
        let source = ScriptedSource::default();
        let cache = BrokenCache {
            fail_store: true,
            ..BrokenCache::default()
        };

        let snapshot =
            get_activity_snapshot(&source, &cache, now(), SNAPSHOT_TTL_MS).expect("snapshot");

        assert!(!snapshot.from_cache);
        assert_eq!(snapshot.total_contributions, 88);
        assert_eq!(source.calls(), 3);
        assert_eq!(cache.store_attempts.load(Ordering::SeqCst), 1);
    }
}
