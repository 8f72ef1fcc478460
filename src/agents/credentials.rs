//! Credentials / CAPTCHA agent.
//!
//! Detects CAPTCHA elements and resolves them through the configured
//! strategy: an external solving service when available, otherwise a saved
//! screenshot plus a manual operator prompt. Login automation is reserved;
//! the operator is expected to be signed in already (or an existing browser
//! session is attached).

use crate::config::{CaptchaHandler, CaptchaSettings};
use crate::constants::timing;
use crate::error::Result;
use crate::page::{PageDriver, WaitState};
use crate::prompt::OperatorPrompt;
use crate::session::{Pacing, SessionControl};
use crate::solver::CaptchaSolver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// CAPTCHA and (future) login handling.
pub struct CredentialsAgent {
    settings: CaptchaSettings,
    data_dir: PathBuf,
    solver: Arc<dyn CaptchaSolver>,
    prompt: Arc<dyn OperatorPrompt>,
    session: SessionControl,
    pacing: Pacing,
    default_timeout: Duration,
    attach_existing: bool,
}

impl CredentialsAgent {
    pub fn new(
        settings: CaptchaSettings,
        data_dir: impl Into<PathBuf>,
        solver: Arc<dyn CaptchaSolver>,
        prompt: Arc<dyn OperatorPrompt>,
        session: SessionControl,
    ) -> Self {
        Self {
            settings,
            data_dir: data_dir.into(),
            solver,
            prompt,
            session,
            pacing: Pacing::human(),
            default_timeout: timing::DEFAULT_TIMEOUT,
            attach_existing: false,
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

    pub fn with_attach_existing(mut self, attach: bool) -> Self {
        self.attach_existing = attach;
        self
    }

    /// Detect and resolve a CAPTCHA.
    ///
    /// Returns `Ok(None)` when no CAPTCHA appears within the wait budget or
    /// when neither strategy produced a solution.
    pub async fn handle_captcha(
        &self,
        page: &dyn PageDriver,
        captcha_selector: &str,
    ) -> Result<Option<String>> {
        self.session.pause_point().await?;

        if page
            .wait_for_selector(captcha_selector, WaitState::Visible, self.default_timeout)
            .await
            .is_err()
        {
            tracing::debug!(selector = captcha_selector, "no CAPTCHA detected");
            return Ok(None);
        }

        tracing::info!("CAPTCHA detected");
        self.pacing.human_delay().await;

        if self.settings.handler == CaptchaHandler::External && !self.settings.api_key.is_empty() {
            match self.solve_external(page, captcha_selector).await {
                Ok(Some(solution)) => return Ok(Some(solution)),
                Ok(None) => tracing::warn!("external solver gave no solution, falling back"),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => tracing::warn!(error = %err, "external solver failed, falling back"),
            }
        }

        self.solve_manual(page, captcha_selector).await
    }

    /// Whether the login-success indicator is visible.
    pub async fn verify_login_status(
        &self,
        page: &dyn PageDriver,
        success_selector: &str,
    ) -> bool {
        page.wait_for_selector(success_selector, WaitState::Visible, self.default_timeout)
            .await
            .is_ok()
    }

    /// Reserved: automated login for a platform.
    ///
    /// Attach mode reuses the operator's existing browser session; anything
    /// else is intentionally unimplemented for now.
    pub async fn login_to_platform(&self, platform_name: &str) -> Result<()> {
        if self.attach_existing {
            tracing::info!(platform = platform_name, "using existing browser session");
            return Ok(());
        }
        tracing::warn!(
            platform = platform_name,
            "automated login is not implemented; sign in manually"
        );
        Ok(())
    }

    async fn solve_external(
        &self,
        page: &dyn PageDriver,
        captcha_selector: &str,
    ) -> Result<Option<String>> {
        tracing::info!("attempting external CAPTCHA solve");
        self.pacing.human_delay().await;
        let image = page.screenshot_element(captcha_selector).await?;
        self.solver
            .solve_image(&image, &self.session.cancel_token())
            .await
    }

    async fn solve_manual(
        &self,
        page: &dyn PageDriver,
        captcha_selector: &str,
    ) -> Result<Option<String>> {
        tracing::info!("manual CAPTCHA solving selected");
        self.pacing.human_delay().await;

        let image = page.screenshot_element(captcha_selector).await?;
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| crate::error::Error::io(&self.data_dir, e))?;
        let image_path = self
            .data_dir
            .join(format!("temp_captcha_{}.png", uuid::Uuid::new_v4()));
        std::fs::write(&image_path, &image).map_err(|e| crate::error::Error::io(&image_path, e))?;
        tracing::info!(path = %image_path.display(), "CAPTCHA image saved for manual solve");

        let answer = self.prompt.prompt_line(&format!(
            "CAPTCHA image saved to {}. Please enter the solution (or press Enter to skip):",
            image_path.display()
        ));

        // Best-effort cleanup regardless of the answer.
        if let Err(err) = std::fs::remove_file(&image_path) {
            tracing::debug!(error = %err, "could not remove temp captcha image");
        }

        let answer = answer?;
        if answer.is_empty() {
            Ok(None)
        } else {
            self.pacing.human_delay().await;
            Ok(Some(answer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::page::fake::{FakeElement, FakePage};
    use crate::prompt::scripted::ScriptedPrompt;
    use crate::solver::testing::ScriptedSolver;
    use crate::solver::NullSolver;

    fn captcha_page() -> FakePage {
        let page = FakePage::new();
        page.add_element("img.captcha__image", FakeElement::visible());
        page
    }

    fn agent_with(
        handler: CaptchaHandler,
        api_key: &str,
        data_dir: &std::path::Path,
        solver: Arc<dyn CaptchaSolver>,
        prompt: Arc<ScriptedPrompt>,
    ) -> CredentialsAgent {
        CredentialsAgent::new(
            CaptchaSettings {
                handler,
                api_key: api_key.to_string(),
            },
            data_dir,
            solver,
            prompt,
            SessionControl::new(),
        )
        .with_pacing(Pacing::none())
    }

    #[tokio::test]
    async fn test_no_captcha_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Arc::new(ScriptedPrompt::with_answers(vec![]));
        let agent = agent_with(
            CaptchaHandler::Manual,
            "",
            dir.path(),
            Arc::new(NullSolver),
            Arc::clone(&prompt),
        );

        let page = FakePage::new();
        let result = agent.handle_captcha(&page, "img.captcha__image").await.unwrap();
        assert!(result.is_none());
        assert_eq!(prompt.question_count(), 0);
    }

    #[tokio::test]
    async fn test_external_solver_supplies_solution() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Arc::new(ScriptedPrompt::with_answers(vec![]));
        let agent = agent_with(
            CaptchaHandler::External,
            "key",
            dir.path(),
            Arc::new(ScriptedSolver::solves_with("XK42")),
            Arc::clone(&prompt),
        );

        let page = captcha_page();
        let result = agent.handle_captcha(&page, "img.captcha__image").await.unwrap();
        assert_eq!(result.as_deref(), Some("XK42"));
        assert_eq!(prompt.question_count(), 0);
    }

    #[tokio::test]
    async fn test_external_timeout_falls_back_to_manual() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Arc::new(ScriptedPrompt::with_answers(vec!["typed-answer"]));
        let agent = agent_with(
            CaptchaHandler::External,
            "key",
            dir.path(),
            Arc::new(ScriptedSolver::with_results(vec![Ok(None)])),
            Arc::clone(&prompt),
        );

        let page = captcha_page();
        let result = agent.handle_captcha(&page, "img.captcha__image").await.unwrap();
        assert_eq!(result.as_deref(), Some("typed-answer"));
        assert_eq!(prompt.question_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_saves_then_deletes_temp_image() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Arc::new(ScriptedPrompt::with_answers(vec!["abc"]));
        let agent = agent_with(
            CaptchaHandler::Manual,
            "",
            dir.path(),
            Arc::new(NullSolver),
            Arc::clone(&prompt),
        );

        let page = captcha_page();
        let result = agent.handle_captcha(&page, "img.captcha__image").await.unwrap();
        assert_eq!(result.as_deref(), Some("abc"));

        // The prompt saw the temp path, and the file is gone afterwards.
        let question = prompt.questions.lock().unwrap()[0].clone();
        assert!(question.contains("temp_captcha_"));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_manual_empty_answer_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Arc::new(ScriptedPrompt::with_answers(vec![""]));
        let agent = agent_with(
            CaptchaHandler::Manual,
            "",
            dir.path(),
            Arc::new(NullSolver),
            Arc::clone(&prompt),
        );

        let page = captcha_page();
        let result = agent.handle_captcha(&page, "img.captcha__image").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_session_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Arc::new(ScriptedPrompt::with_answers(vec![]));
        let session = SessionControl::new();
        session.stop();
        let agent = CredentialsAgent::new(
            CaptchaSettings::default(),
            dir.path(),
            Arc::new(NullSolver),
            prompt,
            session,
        )
        .with_pacing(Pacing::none());

        let page = captcha_page();
        let result = agent.handle_captcha(&page, "img.captcha__image").await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_verify_login_status() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Arc::new(ScriptedPrompt::with_answers(vec![]));
        let agent = agent_with(
            CaptchaHandler::Manual,
            "",
            dir.path(),
            Arc::new(NullSolver),
            prompt,
        );

        let page = FakePage::new();
        assert!(!agent.verify_login_status(&page, "img.global-nav__me-photo").await);

        page.add_element("img.global-nav__me-photo", FakeElement::visible());
        assert!(agent.verify_login_status(&page, "img.global-nav__me-photo").await);
    }
}
