//! # jobflow-core
//!
//! A supervised, cancellable, rate-limited orchestration library for
//! browser-driven job-application automation.
//!
//! ## Core Components
//!
//! - **Controller**: session lifecycle, agent wiring, flow-level retries
//! - **TaskManager**: bounded-concurrency task queue with timeouts and
//!   cancellation
//! - **Agents**: navigation, platform (LinkedIn-style), form filling,
//!   credentials/CAPTCHA, CV parsing, user profiles
//! - **ActivityLog**: append-only CSV record of every agent action with
//!   size-based rotation
//! - **Learning**: per-action outcome history feeding confidence scores
//!
//! The browser itself stays behind the [`page::PageDriver`] trait; any
//! DOM-automation backend with selector waits, clicks, screenshots and
//! popup events can drive the same flows.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jobflow_core::{Controller, Platform, Settings};
//!
//! let (settings, warnings) = Settings::from_env();
//! for warning in &warnings {
//!     eprintln!("[settings] {}", warning);
//! }
//!
//! let controller = Controller::builder(settings, page).build()?;
//! controller.start_session().await?;
//! controller.run_platform_flow(Platform::LinkedIn, "Rust Engineer", "Remote").await?;
//! controller.end_session().await?;
//! ```

pub mod activity;
pub mod adapters;
pub mod agents;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod learning;
pub mod llm;
pub mod page;
pub mod prompt;
pub mod retry;
pub mod session;
pub mod solver;
pub mod tasks;
pub mod telemetry;

// Re-exports for convenience
pub use activity::{
    ActivityFilter, ActivityLog, ActivityRecord, ActivityStatus, TimeWindow, TypeCategory,
};
pub use adapters::{exit_code, help_text, parse_command, CliCommand, CliOutcome, CliSession};
pub use agents::{
    ApplicationStatus, CredentialsAgent, CvData, CvEnricher, CvParserAgent,
    DocumentTextExtractor, EasyApplyOutcome, FieldKind, FieldMapping, FormFillerAgent,
    JobPosting, JobPreferences, LinkedInAgent, NavigationAgent, PlainTextExtractor,
    ProfileBackend, RecoveryKind, UserProfile, UserProfileStore, WorkMode,
};
pub use config::{
    BrowserSettings, BrowserType, CaptchaHandler, CaptchaSettings, LogLevel, PlatformSettings,
    Settings, SystemSettings, TelemetrySettings, Viewport,
};
pub use controller::{Controller, ControllerBuilder, Platform};
pub use error::{Error, Result};
pub use learning::{
    ConfidenceJudge, ConfidenceScorer, LearningPipeline, LlmConfidenceJudge, Outcome,
    DEFAULT_WINDOW,
};
pub use llm::{
    ChatMessage, ChatRole, ClientConfig, CompletionRequest, CompletionResponse, HttpChatClient,
    LlmClient, NullLlm,
};
pub use page::{PageDriver, PopupOutcome, WaitState, WaitUntil};
pub use prompt::{NullPrompt, OperatorPrompt, StdinPrompt};
pub use retry::RetryPolicy;
pub use session::{CancelToken, Pacing, SessionControl, SessionState};
pub use solver::{CaptchaSolver, HttpCaptchaSolver, NullSolver, SolverConfig};
pub use tasks::{Deferred, Task, TaskKind, TaskManager, TaskStatus};
pub use telemetry::{TelemetryEvent, TelemetrySink};
