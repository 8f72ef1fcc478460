//! Read-only filtering over activity records for the UI layers.
//!
//! Filters never mutate the underlying log and apply in a single O(n) pass
//! over the rows they are given; applying the same filter twice yields the
//! same view.

use super::types::{ActivityRecord, ActivityStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// High-level activity-type categories offered by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeCategory {
    #[default]
    All,
    Navigation,
    Data,
    System,
    Agents,
    ErrorsOnly,
    SuccessOnly,
}

impl TypeCategory {
    fn matches(&self, record: &ActivityRecord) -> bool {
        let tag = record.activity_type.as_str();
        match self {
            Self::All => true,
            Self::Navigation => {
                matches!(tag, "navigation" | "click" | "scroll" | "page")
            }
            Self::Data => {
                matches!(
                    tag,
                    "document" | "application" | "job_search_apply" | "form" | "cv" | "profile"
                )
            }
            Self::System => {
                tag.starts_with("task") || matches!(tag, "session" | "system" | "cleanup" | "performance")
            }
            Self::Agents => {
                matches!(tag, "captcha" | "auth" | "agent" | "delegation" | "handoff")
            }
            Self::ErrorsOnly => record.status.is_failure(),
            Self::SuccessOnly => record.status == ActivityStatus::Success,
        }
    }
}

/// Time window applied to record timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    #[default]
    All,
    /// Rows from the last N minutes.
    LastMinutes(i64),
    /// Rows since UTC midnight.
    Today,
    /// Inclusive interval.
    Custom {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl TimeWindow {
    /// The preset windows the UI exposes: 5m, 15m, 1h.
    pub fn last_5m() -> Self {
        Self::LastMinutes(5)
    }
    pub fn last_15m() -> Self {
        Self::LastMinutes(15)
    }
    pub fn last_hour() -> Self {
        Self::LastMinutes(60)
    }

    fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::LastMinutes(minutes) => timestamp >= now - ChronoDuration::minutes(*minutes),
            Self::Today => {
                let midnight = now
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight is valid")
                    .and_utc();
                timestamp >= midnight
            }
            Self::Custom { from, to } => timestamp >= *from && timestamp <= *to,
        }
    }
}

/// Composite read-only filter over activity rows.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub category: TypeCategory,
    /// Exact agent-name match; `None` keeps all agents.
    pub agent: Option<String>,
    pub window: TimeWindow,
    /// Case-insensitive substring over details and type.
    pub search: Option<String>,
}

impl ActivityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: TypeCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    /// Apply the filter to a loaded window of records.
    pub fn apply<'a>(
        &self,
        records: &'a [ActivityRecord],
        now: DateTime<Utc>,
    ) -> Vec<&'a ActivityRecord> {
        let needle = self.search.as_deref().map(str::to_lowercase);
        records
            .iter()
            .filter(|r| self.category.matches(r))
            .filter(|r| {
                self.agent
                    .as_deref()
                    .map_or(true, |agent| r.agent_name == agent)
            })
            .filter(|r| self.window.contains(r.timestamp, now))
            .filter(|r| {
                needle.as_deref().map_or(true, |n| {
                    r.details.to_lowercase().contains(n)
                        || r.activity_type.to_lowercase().contains(n)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: &str, agent: &str, status: ActivityStatus, age_minutes: i64) -> ActivityRecord {
        let mut r = ActivityRecord::new(tag, format!("{} event", tag), status, agent, "");
        r.timestamp = Utc::now() - ChronoDuration::minutes(age_minutes);
        r
    }

    fn sample() -> Vec<ActivityRecord> {
        vec![
            record("navigation", "Navigator", ActivityStatus::Success, 1),
            record("click", "Navigator", ActivityStatus::Error, 2),
            record("task", "TaskManager", ActivityStatus::Created, 10),
            record("captcha", "Credentials", ActivityStatus::Error, 30),
            record("job_search_apply", "Controller", ActivityStatus::Success, 90),
        ]
    }

    #[test]
    fn test_category_filters() {
        let rows = sample();
        let now = Utc::now();

        let nav = ActivityFilter::new()
            .with_category(TypeCategory::Navigation)
            .apply(&rows, now);
        assert_eq!(nav.len(), 2);

        let errors = ActivityFilter::new()
            .with_category(TypeCategory::ErrorsOnly)
            .apply(&rows, now);
        assert_eq!(errors.len(), 2);

        let system = ActivityFilter::new()
            .with_category(TypeCategory::System)
            .apply(&rows, now);
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].activity_type, "task");
    }

    #[test]
    fn test_agent_and_search_filters() {
        let rows = sample();
        let now = Utc::now();

        let nav_agent = ActivityFilter::new().with_agent("Navigator").apply(&rows, now);
        assert_eq!(nav_agent.len(), 2);

        let search = ActivityFilter::new().with_search("CAPTCHA").apply(&rows, now);
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].agent_name, "Credentials");
    }

    #[test]
    fn test_time_windows() {
        let rows = sample();
        let now = Utc::now();

        let recent = ActivityFilter::new()
            .with_window(TimeWindow::last_5m())
            .apply(&rows, now);
        assert_eq!(recent.len(), 2);

        let hour = ActivityFilter::new()
            .with_window(TimeWindow::last_hour())
            .apply(&rows, now);
        assert_eq!(hour.len(), 4);

        let custom = ActivityFilter::new()
            .with_window(TimeWindow::Custom {
                from: now - ChronoDuration::minutes(40),
                to: now - ChronoDuration::minutes(20),
            })
            .apply(&rows, now);
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].activity_type, "captcha");
    }

    #[test]
    fn test_filter_is_idempotent() {
        let rows = sample();
        let now = Utc::now();
        let filter = ActivityFilter::new()
            .with_category(TypeCategory::ErrorsOnly)
            .with_window(TimeWindow::last_hour());

        let first: Vec<String> = filter.apply(&rows, now).iter().map(|r| r.row_id.clone()).collect();
        let second: Vec<String> = filter.apply(&rows, now).iter().map(|r| r.row_id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_filter_does_not_mutate_input() {
        let rows = sample();
        let before = rows.clone();
        let _ = ActivityFilter::new().apply(&rows, Utc::now());
        assert_eq!(rows, before);
    }
}
