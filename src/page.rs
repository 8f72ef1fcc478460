//! Abstract browser page driver.
//!
//! The core never talks to a concrete DOM-automation library; it depends on
//! this trait, which any backend with selector waits, clicks, fills,
//! screenshots, frame access and popup events can implement. Only one agent
//! acts on the page at a time (the controller dispatches sequentially), so
//! implementations may assume serialized calls.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Element state to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Present in the DOM.
    Attached,
    /// Present and visible.
    Visible,
}

/// Page-load condition for navigations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

/// What happened after clicking a link that may open a new tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupOutcome {
    /// A popup/new tab opened.
    PopupOpened,
    /// The current tab navigated away.
    SameTabNavigated,
    /// Nothing observable happened.
    NoEffect,
}

/// Driver surface the agents operate against.
#[async_trait]
pub trait PageDriver: Send + Sync {
    // Navigation
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;
    async fn current_url(&self) -> String;
    async fn go_back(&self) -> Result<()>;
    async fn reload(&self) -> Result<()>;

    // Element queries
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<()>;
    /// Non-waiting existence check.
    async fn query_exists(&self, selector: &str) -> bool;
    async fn is_visible(&self, selector: &str) -> Result<bool>;
    /// Text content; `Ok(None)` when the selector matches nothing.
    async fn text_content(&self, selector: &str) -> Result<Option<String>>;
    /// Attribute value of the first match; `Ok(None)` when absent.
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;
    /// Attribute values of every match, skipping elements without it.
    async fn attribute_all(&self, selector: &str, name: &str) -> Result<Vec<String>>;
    async fn is_checked(&self, selector: &str) -> Result<bool>;

    // Interactions
    async fn click(&self, selector: &str) -> Result<()>;
    /// Replace the field's value.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;
    /// Append keystrokes to the field.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;
    async fn set_input_files(&self, selector: &str, path: &Path) -> Result<()>;
    async fn hover(&self, selector: &str) -> Result<()>;
    async fn scroll_into_view(&self, selector: &str) -> Result<()>;
    async fn press_key(&self, key: &str) -> Result<()>;
    async fn mouse_wheel(&self, delta_x: f64, delta_y: f64) -> Result<()>;
    async fn mouse_down(&self) -> Result<()>;
    async fn mouse_up(&self) -> Result<()>;

    // Scripting and capture
    async fn evaluate(&self, script: &str) -> Result<Value>;
    async fn screenshot_page(&self, path: &Path) -> Result<()>;
    /// PNG bytes of one element.
    async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>>;

    // Frames (single level: enter one iframe, exit back to the root)
    async fn enter_frame(&self, selector: &str) -> Result<()>;
    async fn exit_frame(&self) -> Result<()>;

    // Popups
    /// Click `selector` and report whether a popup opened or the tab
    /// navigated within `timeout`.
    async fn click_expect_popup(&self, selector: &str, timeout: Duration) -> Result<PopupOutcome>;
    /// Close the most recent popup, if any.
    async fn close_popup(&self) -> Result<()>;
}
