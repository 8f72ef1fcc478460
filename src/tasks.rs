//! Bounded-concurrency task manager.
//!
//! Tasks wrap deferred asynchronous units of work. At most `max_concurrent`
//! tasks run at once; a producer blocks cooperatively, polling for a free
//! slot. Every running task is bounded by a timeout and honours its cancel
//! token at the next cooperative point. Terminal statuses are sticky: no
//! transition ever leaves one.

use crate::activity::{ActivityLog, ActivityStatus};
use crate::constants::{messages, timing};
use crate::error::{Error, Result};
use crate::session::CancelToken;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// A deferred unit of work producing an opaque JSON result.
pub type Deferred = BoxFuture<'static, Result<Value>>;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses can never be left.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of one task's bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Named task kinds accepted by the dispatch surface.
///
/// The reserved kinds parse but currently log-and-drop, matching the
/// behaviour for unknown names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    JobSearch,
    Captcha,
    StateRestoration,
    Recovery,
    Verification,
}

impl TaskKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "job_search" => Some(Self::JobSearch),
            "captcha" => Some(Self::Captcha),
            "state_restoration" => Some(Self::StateRestoration),
            "recovery" => Some(Self::Recovery),
            "verification" => Some(Self::Verification),
            _ => None,
        }
    }

    /// Kinds whose consumers do not exist yet.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Self::StateRestoration | Self::Recovery | Self::Verification
        )
    }
}

struct TaskEntry {
    record: Task,
    cancel: CancelToken,
    deferred: Option<Deferred>,
}

struct Inner {
    tasks: Mutex<HashMap<String, TaskEntry>>,
    active: Mutex<HashSet<String>>,
    max_concurrent: usize,
    queue_check_interval: Duration,
    task_timeout: Duration,
    tracker: Arc<ActivityLog>,
}

/// Bounded-concurrency task queue with per-task timeout and cancellation.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    pub fn new(tracker: Arc<ActivityLog>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(HashMap::new()),
                active: Mutex::new(HashSet::new()),
                max_concurrent: 3,
                queue_check_interval: timing::QUEUE_CHECK_INTERVAL,
                task_timeout: timing::TASK_TIMEOUT,
                tracker,
            }),
        }
    }

    pub fn with_max_concurrent(self, max_concurrent: usize) -> Self {
        self.rebuild(|inner| Inner {
            max_concurrent: max_concurrent.max(1),
            ..inner
        })
    }

    pub fn with_task_timeout(self, task_timeout: Duration) -> Self {
        self.rebuild(|inner| Inner {
            task_timeout,
            ..inner
        })
    }

    pub fn with_queue_check_interval(self, interval: Duration) -> Self {
        self.rebuild(|inner| Inner {
            queue_check_interval: interval,
            ..inner
        })
    }

    fn rebuild(self, f: impl FnOnce(Inner) -> Inner) -> Self {
        let inner = Arc::try_unwrap(self.inner)
            .unwrap_or_else(|_| panic!("task manager reconfigured after sharing"));
        Self {
            inner: Arc::new(f(inner)),
        }
    }

    /// Register a deferred unit as a pending task.
    ///
    /// The task id defaults to the creation timestamp; collisions get a
    /// numeric suffix so ids stay unique.
    pub fn create(&self, deferred: Deferred, task_id: Option<String>) -> Result<Task> {
        let mut tasks = self.lock_tasks();
        let base_id = task_id
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
        let mut id = base_id.clone();
        let mut suffix = 1;
        while tasks.contains_key(&id) {
            id = format!("{}-{}", base_id, suffix);
            suffix += 1;
        }

        let record = Task {
            task_id: id.clone(),
            created_at: Utc::now(),
            completed_at: None,
            status: TaskStatus::Pending,
            result: None,
            error: None,
        };
        tasks.insert(
            id.clone(),
            TaskEntry {
                record: record.clone(),
                cancel: CancelToken::new(),
                deferred: Some(deferred),
            },
        );
        drop(tasks);

        self.inner.tracker.log_activity(
            "task",
            &messages::task_created(&id),
            ActivityStatus::Created,
            "TaskManager",
            "",
        )?;
        Ok(record)
    }

    /// Run a pending task to completion.
    ///
    /// Blocks cooperatively until a concurrency slot frees up, then races
    /// the deferred unit against the task timeout and the cancel token.
    pub async fn run(&self, task_id: &str) -> Result<Value> {
        let (mut deferred, cancel) = self.claim(task_id)?;

        // Wait for a slot, honouring cancellation while queued.
        loop {
            if cancel.is_cancelled() {
                self.finish(task_id, TaskStatus::Cancelled, None, Some("cancelled while queued"));
                return Err(Error::Cancelled);
            }
            {
                let mut active = self.lock_active();
                if active.len() < self.inner.max_concurrent {
                    active.insert(task_id.to_string());
                    break;
                }
            }
            sleep(self.inner.queue_check_interval).await;
        }

        self.set_status(task_id, TaskStatus::Running);

        let outcome = tokio::select! {
            result = &mut deferred => Some(result),
            _ = sleep(self.inner.task_timeout) => None,
            _ = cancel.cancelled() => {
                self.lock_active().remove(task_id);
                self.finish(task_id, TaskStatus::Cancelled, None, Some("cancelled"));
                return Err(Error::Cancelled);
            }
        };

        self.lock_active().remove(task_id);
        match outcome {
            Some(Ok(value)) => {
                self.finish(task_id, TaskStatus::Completed, Some(value.clone()), None);
                self.log_task(
                    &messages::task_completed(task_id),
                    ActivityStatus::Success,
                );
                Ok(value)
            }
            Some(Err(err)) => {
                self.finish(task_id, TaskStatus::Failed, None, Some(&err.to_string()));
                self.log_task(
                    &messages::task_failed(&format!("{}: {}", task_id, err)),
                    ActivityStatus::Error,
                );
                Err(err)
            }
            None => {
                self.finish(task_id, TaskStatus::Timeout, None, Some("Task timed out"));
                self.log_task(
                    &messages::task_failed(&format!("{}: timed out", task_id)),
                    ActivityStatus::Timeout,
                );
                Err(Error::timeout(self.inner.task_timeout))
            }
        }
    }

    /// Cancel a running task. Pending and terminal tasks return `false`.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut tasks = self.lock_tasks();
        let Some(entry) = tasks.get_mut(task_id) else {
            return false;
        };
        if entry.record.status != TaskStatus::Running {
            return false;
        }
        entry.cancel.cancel();
        entry.record.status = TaskStatus::Cancelled;
        entry.record.completed_at = Some(Utc::now());
        entry.record.error = Some("cancelled".to_string());
        drop(tasks);

        self.lock_active().remove(task_id);
        self.log_task(
            &format!("Task cancelled: {}", task_id),
            ActivityStatus::Cancelled,
        );
        true
    }

    /// Snapshot of the currently running tasks.
    pub fn active(&self) -> Vec<Task> {
        let active = self.lock_active().clone();
        let tasks = self.lock_tasks();
        active
            .iter()
            .filter_map(|id| tasks.get(id).map(|e| e.record.clone()))
            .collect()
    }

    /// Snapshot of one task by id.
    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.lock_tasks().get(task_id).map(|e| e.record.clone())
    }

    // ---- internals ----

    fn claim(&self, task_id: &str) -> Result<(Deferred, CancelToken)> {
        let mut tasks = self.lock_tasks();
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::Internal(format!("unknown task '{}'", task_id)))?;
        if entry.record.status != TaskStatus::Pending {
            return Err(Error::Internal(format!(
                "task '{}' is {}, not pending",
                task_id, entry.record.status
            )));
        }
        let deferred = entry
            .deferred
            .take()
            .ok_or_else(|| Error::Internal(format!("task '{}' already claimed", task_id)))?;
        Ok((deferred, entry.cancel.clone()))
    }

    fn set_status(&self, task_id: &str, status: TaskStatus) {
        let mut tasks = self.lock_tasks();
        if let Some(entry) = tasks.get_mut(task_id) {
            if !entry.record.status.is_terminal() {
                entry.record.status = status;
            }
        }
    }

    /// Move a task into a terminal state; sticky once terminal.
    fn finish(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<&str>,
    ) {
        debug_assert!(status.is_terminal());
        let mut tasks = self.lock_tasks();
        if let Some(entry) = tasks.get_mut(task_id) {
            if entry.record.status.is_terminal() {
                return;
            }
            entry.record.status = status;
            entry.record.completed_at = Some(Utc::now());
            entry.record.result = result;
            entry.record.error = error.map(String::from);
        }
    }

    fn log_task(&self, details: &str, status: ActivityStatus) {
        if let Err(err) = self
            .inner
            .tracker
            .log_activity("task", details, status, "TaskManager", "")
        {
            tracing::warn!(error = %err, "failed to log task transition");
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskEntry>> {
        self.inner.tasks.lock().expect("task map poisoned")
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner.active.lock().expect("active set poisoned")
    }
}
