//! Timing constants, shared selectors, and the fixed user-facing message
//! vocabulary.
//!
//! Single source of truth for every wait, delay and retry knob used across
//! the agents. All durations are `std::time::Duration`; there is no
//! millisecond/second mixing anywhere downstream.

use std::time::Duration;

/// Timing knobs shared by all agents.
pub mod timing {
    use super::Duration;

    // Maximum waits / timeouts
    /// Hard ceiling for any single wait (selector waits, solver polling).
    pub const MAX_WAIT_TIME: Duration = Duration::from_secs(10);
    /// Default timeout for element waits.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Extended wait for full page loads.
    pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);

    // Human-like interaction delays
    pub const HUMAN_DELAY_MIN: Duration = Duration::from_millis(300);
    pub const HUMAN_DELAY_MAX: Duration = Duration::from_millis(1000);
    /// Hold time during drag operations.
    pub const DRAG_HOLD_MIN: Duration = Duration::from_millis(500);
    pub const DRAG_HOLD_MAX: Duration = Duration::from_millis(1000);

    // Standard operation delays
    /// Interval for checking conditions, queues and pause flags.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
    /// Delay around major actions (clicks, submissions).
    pub const ACTION_DELAY: Duration = Duration::from_secs(2);
    /// Delay after page transitions.
    pub const PAGE_TRANSITION_DELAY: Duration = Duration::from_secs(3);
    /// Delay between scroll steps.
    pub const SCROLL_STEP_DELAY: Duration = Duration::from_millis(500);
    /// Cool-off after errors.
    pub const ERROR_DELAY: Duration = Duration::from_secs(3);

    // Retry configuration
    pub const MAX_RETRIES: u32 = 3;
    pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(2);
    pub const RETRY_BACKOFF_FACTOR: f64 = 2.0;

    // Task manager
    /// How often a blocked producer re-checks for a free slot.
    pub const QUEUE_CHECK_INTERVAL: Duration = Duration::from_millis(500);
    /// Outer bound on any single task.
    pub const TASK_TIMEOUT: Duration = Duration::from_secs(300);

    // Form handling
    pub const FORM_SUBMIT_DELAY: Duration = Duration::from_secs(2);
    pub const FORM_FIELD_DELAY: Duration = Duration::from_millis(500);
    pub const FILE_UPLOAD_DELAY: Duration = Duration::from_secs(3);

    // Platform specifics
    /// Wait for the easy-apply modal to appear after the button click.
    pub const EASY_APPLY_MODAL_DELAY: Duration = Duration::from_secs(2);
    /// Wait for the job detail pane after selecting a card.
    pub const JOB_CARD_LOAD_DELAY: Duration = Duration::from_secs(2);
    /// Wait after an infinite-scroll step for new content.
    pub const INFINITE_SCROLL_DELAY: Duration = Duration::from_secs(2);
    pub const SEARCH_RESULTS_DELAY: Duration = Duration::from_secs(2);

    // Modal / popup handling
    pub const COOKIE_BANNER_TIMEOUT: Duration = Duration::from_secs(3);
    pub const MODAL_TRANSITION_DELAY: Duration = Duration::from_secs(1);
    /// How long to wait for an external-apply popup before giving up.
    pub const POPUP_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

    // Document processing
    /// Yield between PDF pages so the UI stays responsive.
    pub const PDF_PAGE_PARSE_DELAY: Duration = Duration::from_millis(100);
}

/// Selectors shared across agents.
pub mod selectors {
    pub const JOBS_TAB: &str = "a[data-control-name=\"nav_jobs\"]";
    pub const EASY_APPLY_BUTTON: &str = "button.jobs-apply-button";
    pub const CAPTCHA_IMAGE: &str = "img.captcha__image";
    pub const JOBS_CONTAINER: &str = ".jobs-search-results-list";
    pub const MODAL_CLOSE: &str = "button[aria-label=\"Dismiss\"]";
    pub const FORM_ERROR_BANNER: &str = ".artdeco-inline-feedback--error";
    pub const EXTERNAL_APPLY_LINK: &str = "a[data-control-name=\"jobdetails_topcard_inapply\"]";
    pub const SUBMIT_APPLICATION: &str = "button[aria-label=\"Submit application\"]";
    pub const CONTINUE_BUTTON: &str = "button[aria-label=\"Continue to next step\"]";
    pub const CV_UPLOAD_INPUT: &str = "input[type=\"file\"][name=\"fileId\"]";
    pub const COOKIES_ACCEPT_BUTTON: &str = "button#accept-cookies";
    /// Present only when the session has been signed out.
    pub const SIGN_IN_INDICATOR: &str = "a[href*=\"/login\"]";
    /// Present while the operator is signed in.
    pub const NAV_PROFILE_INDICATOR: &str = "img.global-nav__me-photo";
}

/// Standard messages used across agents for consistent logging.
pub mod messages {
    pub const PAUSE: &str = "Pausing operations...";
    pub const RESUME: &str = "Resuming operations...";
    pub const SUCCESS: &str = "Operation completed successfully.";
    pub const CAPTCHA: &str = "Captcha encountered, manual solve needed.";
    pub const LOGOUT: &str = "User is logged out, re-login required.";
    pub const MAX_RETRIES_REACHED: &str = "Max retries reached. Stopping flow.";

    /// Attempt counter used on every flow retry.
    pub fn retry(attempt: u32, limit: u32, err: &impl std::fmt::Display) -> String {
        format!("Attempt {}/{} failed: {}", attempt, limit, err)
    }

    pub fn task_created(task_id: &str) -> String {
        format!("Created new task: {}", task_id)
    }

    pub fn task_completed(task_id: &str) -> String {
        format!("Task completed successfully: {}", task_id)
    }

    pub fn task_failed(detail: &str) -> String {
        format!("Task failed: {}", detail)
    }
}
