//! Generic, stateless page interactions.
//!
//! Every public action starts with a cooperative pause check and a
//! human-like delay. Navigation retries with exponential backoff; a single
//! attempt that overruns its time box logs and proceeds instead of raising.

use crate::constants::timing;
use crate::error::{Error, Result};
use crate::page::{PageDriver, WaitState, WaitUntil};
use crate::retry::RetryPolicy;
use crate::session::{Pacing, SessionControl};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// Stateless web-automation agent.
pub struct NavigationAgent {
    page: Arc<dyn PageDriver>,
    session: SessionControl,
    pacing: Pacing,
    default_timeout: Duration,
    retry: RetryPolicy,
}

impl NavigationAgent {
    pub fn new(page: Arc<dyn PageDriver>, session: SessionControl) -> Self {
        Self {
            page,
            session,
            pacing: Pacing::human(),
            default_timeout: timing::DEFAULT_TIMEOUT,
            retry: RetryPolicy::standard(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout.min(timing::MAX_WAIT_TIME);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Raise the shared pause flag.
    pub fn pause(&self) {
        tracing::info!("{}", crate::constants::messages::PAUSE);
        self.session.pause();
    }

    /// Clear the shared pause flag.
    pub fn resume(&self) {
        tracing::info!("{}", crate::constants::messages::RESUME);
        self.session.resume();
    }

    /// Navigate to a URL with bounded retries.
    ///
    /// Each attempt is time-boxed by `MAX_WAIT_TIME`; an overrun logs and
    /// proceeds rather than raising, since slow pages often finish loading
    /// in the background.
    pub async fn navigate_to(&self, url: &str) -> Result<()> {
        self.session.pause_point().await?;
        self.retry
            .run(|_attempt| async move {
                self.pacing.human_delay().await;
                match timeout(
                    timing::MAX_WAIT_TIME,
                    self.page
                        .goto(url, WaitUntil::DomContentLoaded, timing::MAX_WAIT_TIME),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_elapsed) => {
                        tracing::warn!(url, "navigation exceeded its time box, proceeding anyway");
                        Ok(())
                    }
                }
            })
            .await?;
        sleep(timing::PAGE_TRANSITION_DELAY).await;
        Ok(())
    }

    /// Click a visible element.
    pub async fn click(&self, selector: &str) -> Result<bool> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page
            .wait_for_selector(selector, WaitState::Visible, self.default_timeout)
            .await?;
        self.page.click(selector).await?;
        sleep(timing::ACTION_DELAY).await;
        Ok(true)
    }

    /// Type into an input, optionally clearing it first.
    pub async fn type_text(&self, selector: &str, text: &str, clear_first: bool) -> Result<bool> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page
            .wait_for_selector(selector, WaitState::Visible, self.default_timeout)
            .await?;
        if clear_first {
            self.page.fill(selector, "").await?;
        }
        self.pacing.human_delay().await;
        self.page.type_text(selector, text).await?;
        Ok(true)
    }

    /// Extract text from a visible element.
    pub async fn extract_text(&self, selector: &str) -> Result<String> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page
            .wait_for_selector(selector, WaitState::Visible, self.default_timeout)
            .await?;
        let text = self.page.text_content(selector).await?.unwrap_or_default();
        Ok(text)
    }

    /// Wait until `expected` appears in the element's text.
    pub async fn wait_for_text(
        &self,
        selector: &str,
        expected: &str,
        wait: Option<Duration>,
    ) -> Result<bool> {
        self.session.pause_point().await?;
        let budget = wait.unwrap_or(self.default_timeout).min(timing::MAX_WAIT_TIME);
        let deadline = Instant::now() + budget;
        while Instant::now() < deadline {
            if let Ok(Some(text)) = self.page.text_content(selector).await {
                if text.contains(expected) {
                    return Ok(true);
                }
            }
            sleep(timing::POLL_INTERVAL).await;
        }
        Err(Error::timeout(budget))
    }

    /// Wait for an arbitrary async condition.
    pub async fn wait_for_condition<F, Fut>(
        &self,
        condition: F,
        wait: Option<Duration>,
        poll: Duration,
    ) -> Result<bool>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        self.session.pause_point().await?;
        let budget = wait.unwrap_or(self.default_timeout).min(timing::MAX_WAIT_TIME);
        let deadline = Instant::now() + budget;
        while Instant::now() < deadline {
            match condition().await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) => tracing::debug!(error = %err, "condition check failed"),
            }
            sleep(poll).await;
        }
        Err(Error::timeout(budget))
    }

    /// Scroll to the bottom of the page in wheel increments.
    pub async fn scroll_to_bottom(&self, step: u32, pause: Duration) -> Result<()> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        let mut height = self.page_height().await;
        let mut position = 0u64;
        while position < height {
            self.session.pause_point().await?;
            position += step as u64;
            self.page.mouse_wheel(0.0, step as f64).await?;
            sleep(pause).await;
            let new_height = self.page_height().await;
            if new_height > height {
                height = new_height;
            }
        }
        Ok(())
    }

    /// Scroll until the element is in the viewport.
    pub async fn scroll_to_element(&self, selector: &str) -> Result<()> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page
            .wait_for_selector(selector, WaitState::Attached, self.default_timeout)
            .await?;
        self.page.scroll_into_view(selector).await
    }

    /// Full-page screenshot.
    pub async fn screenshot(&self, path: &Path) -> Result<()> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page.screenshot_page(path).await?;
        tracing::info!(path = %path.display(), "screenshot saved");
        Ok(())
    }

    /// Whether an element appears within the timeout. Never raises.
    pub async fn element_present(&self, selector: &str, wait: Option<Duration>) -> bool {
        let budget = wait.unwrap_or(self.default_timeout);
        self.page
            .wait_for_selector(selector, WaitState::Attached, budget)
            .await
            .is_ok()
    }

    /// Evaluate JavaScript in the page context.
    pub async fn evaluate_script(&self, script: &str) -> Result<Value> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page.evaluate(script).await
    }

    /// Collect `href` attributes from all matches of `selector`.
    pub async fn extract_links(&self, selector: &str) -> Result<Vec<String>> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page.attribute_all(selector, "href").await
    }

    /// Switch the page context into an iframe (single level).
    pub async fn switch_to_iframe(&self, selector: &str) -> Result<()> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page
            .wait_for_selector(selector, WaitState::Attached, self.default_timeout)
            .await?;
        self.page.enter_frame(selector).await
    }

    /// Restore the root page context.
    pub async fn switch_back_to_main_frame(&self) -> Result<()> {
        self.pacing.human_delay().await;
        self.page.exit_frame().await
    }

    /// Drag one element onto another with a human-like hold.
    pub async fn drag_and_drop(&self, source: &str, target: &str) -> Result<()> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        self.page
            .wait_for_selector(source, WaitState::Attached, self.default_timeout)
            .await?;
        self.page
            .wait_for_selector(target, WaitState::Attached, self.default_timeout)
            .await?;

        self.page.hover(source).await?;
        self.page.mouse_down().await?;
        self.pacing
            .delay_between(timing::DRAG_HOLD_MIN, timing::DRAG_HOLD_MAX)
            .await;
        self.page.hover(target).await?;
        self.page.mouse_up().await
    }

    /// Click the accept-cookies button if a banner is present.
    pub async fn accept_cookies(&self, selector: &str) -> Result<bool> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;
        if !self
            .element_present(selector, Some(timing::COOKIE_BANNER_TIMEOUT))
            .await
        {
            tracing::debug!("no cookie banner found");
            return Ok(false);
        }
        match self.click(selector).await {
            Ok(_) => Ok(true),
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept cookies");
                Ok(false)
            }
        }
    }

    async fn page_height(&self) -> u64 {
        self.page
            .evaluate("() => document.body.scrollHeight")
            .await
            .ok()
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::fake::{FakeElement, FakePage};

    fn agent(page: Arc<FakePage>) -> NavigationAgent {
        NavigationAgent::new(page, SessionControl::new())
            .with_pacing(Pacing::none())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10), 2.0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_retries_then_succeeds() {
        let page = Arc::new(FakePage::new());
        page.script_goto(vec![
            Err(Error::navigation("https://jobs.example", "first attempt refused")),
            Ok(()),
        ]);

        let nav = agent(Arc::clone(&page));
        nav.navigate_to("https://jobs.example").await.unwrap();
        assert_eq!(page.current_url().await, "https://jobs.example");
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_exhausts_retries() {
        let page = Arc::new(FakePage::new());
        page.script_goto(vec![
            Err(Error::navigation("https://a", "down")),
            Err(Error::navigation("https://a", "down")),
            Err(Error::navigation("https://a", "down")),
        ]);

        let nav = agent(Arc::clone(&page));
        let result = nav.navigate_to("https://a").await;
        assert!(matches!(result, Err(Error::Navigation { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_visible_element() {
        let page = Arc::new(FakePage::new());
        page.add_element("#apply", FakeElement::visible());

        let nav = agent(Arc::clone(&page));
        assert!(nav.click("#apply").await.unwrap());
        assert_eq!(page.clicks(), vec!["#apply"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_missing_element_errors() {
        let page = Arc::new(FakePage::new());
        let nav = agent(page);
        assert!(matches!(
            nav.click("#ghost").await,
            Err(Error::ElementNotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_text_clears_first() {
        let page = Arc::new(FakePage::new());
        let mut field = FakeElement::visible();
        field.value = "old".into();
        page.add_element("#title", field);

        let nav = agent(Arc::clone(&page));
        nav.type_text("#title", "Software Engineer", true).await.unwrap();

        let state = page.lock();
        assert_eq!(state.filled, vec![("#title".to_string(), String::new())]);
        assert_eq!(
            state.typed,
            vec![("#title".to_string(), "Software Engineer".to_string())]
        );
        assert_eq!(state.elements["#title"].value, "Software Engineer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_text_finds_expected() {
        let page = Arc::new(FakePage::new());
        page.add_element("#status", FakeElement::with_text("Application sent"));

        let nav = agent(page);
        assert!(nav
            .wait_for_text("#status", "sent", Some(Duration::from_secs(1)))
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_text_times_out() {
        let page = Arc::new(FakePage::new());
        page.add_element("#status", FakeElement::with_text("pending"));

        let nav = agent(page);
        let result = nav
            .wait_for_text("#status", "done", Some(Duration::from_secs(1)))
            .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_present_does_not_raise() {
        let page = Arc::new(FakePage::new());
        page.add_element("#here", FakeElement::visible());

        let nav = agent(page);
        assert!(nav.element_present("#here", None).await);
        assert!(!nav.element_present("#gone", None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_iframe_switch_is_single_level() {
        let page = Arc::new(FakePage::new());
        page.add_element("iframe#captcha", FakeElement::visible());

        let nav = agent(Arc::clone(&page));
        nav.switch_to_iframe("iframe#captcha").await.unwrap();
        assert_eq!(page.lock().frame.as_deref(), Some("iframe#captcha"));

        nav.switch_back_to_main_frame().await.unwrap();
        assert!(page.lock().frame.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_and_drop_sequence() {
        let page = Arc::new(FakePage::new());
        page.add_element("#piece", FakeElement::visible());
        page.add_element("#slot", FakeElement::visible());

        let nav = agent(page);
        nav.drag_and_drop("#piece", "#slot").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_cookies_banner_absent() {
        let page = Arc::new(FakePage::new());
        let nav = agent(page);
        assert!(!nav.accept_cookies("button#accept-cookies").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_agent_defers_actions_until_resume() {
        let page = Arc::new(FakePage::new());
        page.add_element("#later", FakeElement::visible());
        let session = SessionControl::new();
        let nav = Arc::new(
            NavigationAgent::new(page.clone(), session.clone()).with_pacing(Pacing::none()),
        );

        session.pause();
        let pending = {
            let nav = Arc::clone(&nav);
            tokio::spawn(async move { nav.click("#later").await })
        };

        tokio::time::sleep(timing::POLL_INTERVAL * 2).await;
        assert!(page.clicks().is_empty());

        session.resume();
        let result = pending.await.unwrap();
        assert!(result.unwrap());
        assert_eq!(page.clicks(), vec!["#later"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pause_raises() {
        let page = Arc::new(FakePage::new());
        let session = SessionControl::new();
        let nav = Arc::new(
            NavigationAgent::new(page, session.clone()).with_pacing(Pacing::none()),
        );

        session.pause();
        let pending = {
            let nav = Arc::clone(&nav);
            tokio::spawn(async move { nav.navigate_to("https://x").await })
        };
        tokio::time::sleep(timing::POLL_INTERVAL).await;
        session.stop();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
