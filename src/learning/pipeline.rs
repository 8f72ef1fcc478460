//! In-memory record of per-action outcomes.
//!
//! Outcomes are held in a bounded ring buffer per action name, in insertion
//! order. Rolling queries window the most recent entries; with no data they
//! return 0.0 so callers fall back to their base confidence.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Default window for rolling queries.
pub const DEFAULT_WINDOW: usize = 50;

/// Ring-buffer capacity per action; must stay comfortably above the window.
const RING_CAPACITY: usize = 256;

/// One recorded action outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Clamped to `[0, 1]` on record so corrupted values cannot propagate.
    pub confidence: f64,
    pub context: HashMap<String, Value>,
}

/// Per-action outcome store with rolling statistics.
#[derive(Debug, Default)]
pub struct LearningPipeline {
    outcomes: Mutex<HashMap<String, VecDeque<Outcome>>>,
}

impl LearningPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one action.
    pub fn record(
        &self,
        action: &str,
        success: bool,
        confidence: f64,
        context: HashMap<String, Value>,
    ) {
        let confidence = confidence.clamp(0.0, 1.0);
        tracing::info!(
            action,
            success,
            confidence,
            "recording action outcome"
        );

        let mut outcomes = self.lock();
        let ring = outcomes.entry(action.to_string()).or_default();
        if ring.len() == RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(Outcome {
            timestamp: Utc::now(),
            success,
            confidence,
            context,
        });
    }

    /// Success rate over the last `window` outcomes; 0.0 with no data.
    pub fn success_rate(&self, action: &str, window: usize) -> f64 {
        let outcomes = self.lock();
        let Some(ring) = outcomes.get(action).filter(|r| !r.is_empty()) else {
            return 0.0;
        };
        let recent: Vec<&Outcome> = ring.iter().rev().take(window.max(1)).collect();
        let successes = recent.iter().filter(|o| o.success).count();
        successes as f64 / recent.len() as f64
    }

    /// Average confidence over the last `window` outcomes; 0.0 with no data.
    pub fn average_confidence(&self, action: &str, window: usize) -> f64 {
        let outcomes = self.lock();
        let Some(ring) = outcomes.get(action).filter(|r| !r.is_empty()) else {
            return 0.0;
        };
        let recent: Vec<&Outcome> = ring.iter().rev().take(window.max(1)).collect();
        let total: f64 = recent.iter().map(|o| o.confidence).sum();
        total / recent.len() as f64
    }

    /// Number of outcomes stored for an action.
    pub fn outcome_count(&self, action: &str) -> usize {
        self.lock().get(action).map_or(0, VecDeque::len)
    }

    /// Reserved: adjust heuristics from accumulated data.
    pub fn update_heuristics(&self, action: &str) {
        let rate = self.success_rate(action, DEFAULT_WINDOW);
        let avg = self.average_confidence(action, DEFAULT_WINDOW);
        tracing::debug!(action, rate, avg, "heuristics snapshot (no adjustment implemented)");
    }

    /// Reserved: persist outcomes.
    pub fn save(&self) -> Result<()> {
        tracing::debug!("learning pipeline persistence is not implemented; nothing saved");
        Ok(())
    }

    /// Reserved: load persisted outcomes.
    pub fn load(&self) -> Result<()> {
        tracing::debug!("learning pipeline persistence is not implemented; nothing loaded");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Outcome>>> {
        self.outcomes.lock().expect("learning pipeline mutex poisoned")
    }
}
