//! Telemetry event sink.
//!
//! Events are appended as JSON lines under `<storage_path>/events/`, one
//! file per day. The sink is deliberately fire-and-forget: telemetry
//! failures are logged and never surface to the flows that emit events.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// One telemetry event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub data: Value,
}

/// Append-only JSONL telemetry sink.
#[derive(Debug)]
pub struct TelemetrySink {
    enabled: bool,
    events_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl TelemetrySink {
    /// Create a sink rooted at `storage_path` (events land in `events/`).
    pub fn new(storage_path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            enabled,
            events_dir: storage_path.into().join("events"),
            write_lock: Mutex::new(()),
        }
    }

    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self::new(PathBuf::from("."), false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record one event. Failures are swallowed after a log line.
    pub fn track_event(
        &self,
        event_type: impl Into<String>,
        data: Value,
        success: bool,
        confidence: Option<f64>,
    ) {
        if !self.enabled {
            return;
        }
        let event = TelemetryEvent {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            success,
            confidence,
            data,
        };
        if let Err(err) = self.append(&event) {
            tracing::warn!(error = %err, "failed to persist telemetry event");
        }
    }

    /// Record a CLI command invocation.
    pub fn track_cli_command(&self, command: &str, args: Value) {
        self.track_event(
            format!("cli_{}", command),
            serde_json::json!({ "args": args }),
            true,
            None,
        );
    }

    fn append(&self, event: &TelemetryEvent) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().expect("telemetry lock poisoned");
        std::fs::create_dir_all(&self.events_dir)?;
        let file_path = self
            .events_dir
            .join(format!("{}.jsonl", event.timestamp.format("%Y%m%d")));
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(file, "{}", line)
    }
}
