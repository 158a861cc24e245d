use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{
    blocking::Client,
    header::{ACCEPT, USER_AGENT},
};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    acquisition::ActivitySource,
    config::DashboardConfig,
    domain::{ActivityEvent, CalendarTotals, ContributionCalendar, ContributionDay, ProfileSummary},
};

const USER_AGENT_HEADER: &str = "activity-dashboard/0.1";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const LAST_YEAR_KEY: &str = "lastYear";

pub fn build_client() -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT_HEADER)
        .build()
        .map_err(FetchError::Http)
}

/// Read-only view of one user's public GitHub activity.
pub struct GitHubSource {
    client: Client,
    config: DashboardConfig,
}

impl GitHubSource {
    pub fn new(client: Client, config: DashboardConfig) -> Self {
        Self { client, config }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, github_api: bool) -> Result<T, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, USER_AGENT_HEADER)
            .header(ACCEPT, GITHUB_ACCEPT);
        // The calendar lives on a third-party host; the token stays with GitHub.
        if github_api && let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response.json()?)
    }
}

impl ActivitySource for GitHubSource {
    fn fetch_profile(&self) -> Result<ProfileSummary, FetchError> {
        let response: ProfileResponse = self.get_json(&self.config.profile_endpoint(), true)?;
        Ok(ProfileSummary {
            repository_count: response.public_repos,
        })
    }

    fn fetch_calendar(&self) -> Result<ContributionCalendar, FetchError> {
        let response: CalendarResponse = self.get_json(&self.config.calendar_endpoint(), false)?;
        Ok(normalize_calendar(response))
    }

    fn fetch_events(&self) -> Result<Vec<ActivityEvent>, FetchError> {
        let response: Vec<EventResponse> = self.get_json(&self.config.events_endpoint(), true)?;
        Ok(normalize_events(response))
    }
}

fn normalize_calendar(response: CalendarResponse) -> ContributionCalendar {
    let mut totals = CalendarTotals::default();
    for (key, value) in response.total {
        let Some(amount) = value.as_u64() else {
            tracing::debug!(key = %key, "ignoring non-numeric contribution total");
            continue;
        };
        if key == LAST_YEAR_KEY {
            totals.last_year = Some(amount);
        } else if let Ok(year) = key.parse::<i32>() {
            totals.by_year.insert(year, amount);
        }
    }

    let days = response
        .contributions
        .into_iter()
        .filter_map(|day| match NaiveDate::parse_from_str(&day.date, "%Y-%m-%d") {
            Ok(date) => Some(ContributionDay::new(date, clamp_count(day.count))),
            Err(err) => {
                tracing::warn!(date = %day.date, error = %err, "dropping malformed contribution day");
                None
            }
        })
        .collect();

    ContributionCalendar { totals, days }
}

fn clamp_count(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

fn normalize_events(response: Vec<EventResponse>) -> Vec<ActivityEvent> {
    response
        .into_iter()
        .map(|event| ActivityEvent {
            repository: event.repo.name,
            kind: event.kind,
            unit_count: event.payload.commits.map(|commits| commits.len()),
            created_at: event.created_at,
        })
        .collect()
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Background worker disconnected before returning a result")]
    BackgroundWorkerGone,
}

// Response payloads ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    public_repos: u64,
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(default)]
    total: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    contributions: Vec<CalendarDayResponse>,
}

#[derive(Debug, Deserialize)]
struct CalendarDayResponse {
    date: String,
    #[serde(default)]
    count: i64,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    #[serde(rename = "type")]
    kind: String,
    repo: EventRepo,
    #[serde(default)]
    payload: EventPayload,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct EventRepo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    #[serde(default)]
    commits: Option<Vec<serde_json::Value>>,
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
