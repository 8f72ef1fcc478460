//! Activity record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome status attached to every activity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
    Error,
    Failed,
    Info,
    Created,
    Cancelled,
    Timeout,
}

impl ActivityStatus {
    /// Whether this status represents a failure of some kind.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Failed | Self::Timeout)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Failed => "failed",
            Self::Info => "info",
            Self::Created => "created",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// One immutable row in the activity log.
///
/// Serialized column order matches the on-disk CSV header:
/// `row_id,timestamp,agent_name,job_id,type,details,status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique per-process row identifier.
    pub row_id: String,
    /// Second-precision UTC timestamp.
    #[serde(with = "log_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    /// Possibly empty platform/job correlation id.
    pub job_id: String,
    /// Short activity tag, e.g. `session`, `task`, `job_search_apply`.
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Free-text detail.
    pub details: String,
    pub status: ActivityStatus,
}

impl ActivityRecord {
    /// Mint a new record with a fresh `row_id` and the current time.
    pub fn new(
        activity_type: impl Into<String>,
        details: impl Into<String>,
        status: ActivityStatus,
        agent_name: impl Into<String>,
        job_id: impl Into<String>,
    ) -> Self {
        Self {
            row_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            agent_name: agent_name.into(),
            job_id: job_id.into(),
            activity_type: activity_type.into(),
            details: details.into(),
            status,
        }
    }

    /// Single-line rendering used for terminal feedback.
    pub fn as_log_line(&self) -> String {
        format!(
            "{} | {} | {} | {} | {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.agent_name,
            self.activity_type,
            self.details,
            self.status
        )
    }
}

/// ISO-8601 with a space separator and second precision, the format the
/// log files use on disk.
mod log_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ActivityStatus::Success,
            ActivityStatus::Error,
            ActivityStatus::Failed,
            ActivityStatus::Info,
            ActivityStatus::Created,
            ActivityStatus::Cancelled,
            ActivityStatus::Timeout,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json.trim_matches('"'), status.to_string());
            let back: ActivityStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_records_get_unique_row_ids() {
        let a = ActivityRecord::new("session", "started", ActivityStatus::Success, "Controller", "");
        let b = ActivityRecord::new("session", "started", ActivityStatus::Success, "Controller", "");
        assert_ne!(a.row_id, b.row_id);
    }

    #[test]
    fn test_log_line_contains_fields() {
        let record = ActivityRecord::new(
            "job_search_apply",
            "Attempt 1/3 failed: timeout",
            ActivityStatus::Error,
            "Controller",
            "",
        );
        let line = record.as_log_line();
        assert!(line.contains("Controller"));
        assert!(line.contains("job_search_apply"));
        assert!(line.contains("error"));
    }
}
