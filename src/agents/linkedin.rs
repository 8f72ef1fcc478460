//! LinkedIn-style platform agent.
//!
//! Drives the platform-specific flow: verify the session, reach the jobs
//! area, search with layout fallbacks, iterate listings, distinguish
//! easy-apply from external applications, delegate form filling, and record
//! one outcome row per extracted job.
//!
//! The operator is assumed to be signed in. A visible sign-in indicator or
//! CAPTCHA aborts the flow with a named error that the controller does not
//! retry.

use crate::activity::{ActivityLog, ActivityStatus};
use crate::agents::form_filler::{EasyApplyOutcome, FormFillerAgent};
use crate::constants::{messages, selectors, timing};
use crate::error::{Error, Result};
use crate::page::{PageDriver, PopupOutcome, WaitState, WaitUntil};
use crate::session::{Pacing, SessionControl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Default cap on listings processed per search.
pub const DEFAULT_MAX_JOBS: usize = 10;

const JOBS_HOME_URL: &str = "https://www.linkedin.com/jobs/";

/// URL fragments that identify a jobs page.
const JOBS_URL_PATTERNS: [&str; 6] = [
    "linkedin.com/jobs",
    "linkedin.com/my-items/saved-jobs",
    "linkedin.com/job/",
    "/jobs/collections/",
    "/jobs/search",
    "/jobs/view",
];

/// Search inputs, in preference order; the first match wins.
const TITLE_INPUTS: [&str; 4] = [
    "input.jobs-search-box__text-input",
    "input[aria-label=\"Search by title...\"]",
    "input[aria-label*=\"Search jobs\"]",
    "input[placeholder*=\"Search jobs\"]",
];

const LOCATION_INPUTS: [&str; 3] = [
    "input.jobs-search-box__location-input",
    "input[aria-label=\"City, state, or zip code\"]",
    "input[aria-label*=\"location\"]",
];

const SEARCH_BUTTONS: [&str; 2] = ["button[type=\"submit\"]", ".jobs-search-box__submit-button"];

/// Collapsed-layout indicators (magnifier icon, responsive containers).
const NARROW_INDICATORS: [&str; 3] = [
    "button[aria-label=\"Search\"]",
    ".jobs-search-box--collapsed",
    ".jobs-search-box__container--responsive",
];

/// Listing-card patterns: the two-column results list first, then the
/// single-feed fallbacks, tried in order.
const CARD_PATTERNS: [&str; 3] = [
    "li.jobs-search-results__list-item",
    "div[data-job-id]",
    ".jobs-collection-card",
];

/// Detail-pane containers that signal a job loaded.
const DETAIL_PANES: [&str; 3] = [
    ".jobs-search__right-rail",
    ".jobs-details",
    "[data-job-detail-container]",
];

const JOB_TITLE: &str = ".jobs-details-top-card__job-title";
const JOB_COMPANY: &str = ".jobs-details-top-card__company-url";
const JOB_LOCATION: &str = ".jobs-details-top-card__bullet";
const JOB_RECRUITER: &str = ".jobs-poster__name";

/// Final status of one job application attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Applied,
    Redirected,
    Skipped,
    Failed,
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Applied => "applied",
            Self::Redirected => "redirected",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One extracted job with its application outcome.
///
/// Field order matches the `jobs_applied.csv` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_title: String,
    pub company: String,
    pub location: String,
    pub is_easy_apply: bool,
    pub recruiter_name: Option<String>,
    pub recruiter_link: Option<String>,
    pub application_status: ApplicationStatus,
}

/// Bounded recovery routines for known failure shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryKind {
    Navigation,
    Modal,
    Session,
}

/// Platform agent for a LinkedIn-style site.
pub struct LinkedInAgent {
    page: Arc<dyn PageDriver>,
    tracker: Arc<ActivityLog>,
    session: SessionControl,
    form_filler: Arc<FormFillerAgent>,
    pacing: Pacing,
    default_timeout: Duration,
    jobs_csv: PathBuf,
    max_jobs: usize,
    /// Pre-filled answers handed to the easy-apply flow.
    apply_data: HashMap<String, Value>,
}

impl LinkedInAgent {
    pub fn new(
        page: Arc<dyn PageDriver>,
        tracker: Arc<ActivityLog>,
        session: SessionControl,
        form_filler: Arc<FormFillerAgent>,
        jobs_csv: impl Into<PathBuf>,
    ) -> Self {
        Self {
            page,
            tracker,
            session,
            form_filler,
            pacing: Pacing::human(),
            default_timeout: timing::DEFAULT_TIMEOUT,
            jobs_csv: jobs_csv.into(),
            max_jobs: DEFAULT_MAX_JOBS,
            apply_data: HashMap::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_default_timeout(mut self, value: Duration) -> Self {
        self.default_timeout = value.min(timing::MAX_WAIT_TIME);
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_apply_data(mut self, data: HashMap<String, Value>) -> Self {
        self.apply_data = data;
        self
    }

    /// Main state machine: search for jobs and apply to the listings.
    pub async fn search_jobs_and_apply(&self, job_title: &str, location: &str) -> Result<()> {
        self.session.pause_point().await?;
        tracing::info!(job_title, location, "starting job search");

        self.check_captcha_or_logout().await?;

        if !self.url_is_jobs_page().await {
            self.go_to_jobs_tab().await?;
        }
        self.pacing.human_delay().await;

        if self.is_narrow_layout().await {
            tracing::info!("detected narrow/responsive layout");
            if self.handle_responsive_search(job_title, location).await? {
                self.process_job_listings(self.max_jobs).await?;
                return Ok(());
            }
            tracing::info!("responsive search failed, trying the standard layout");
        }

        let title_filled = self.fill_first_match(&TITLE_INPUTS, job_title).await;
        let location_filled = self.fill_first_match(&LOCATION_INPUTS, location).await;
        if !title_filled && !location_filled {
            return Err(Error::element_not_found(
                "job search inputs (title and location)",
            ));
        }

        self.trigger_search().await?;
        sleep(timing::SEARCH_RESULTS_DELAY).await;
        self.process_job_listings(self.max_jobs).await?;
        Ok(())
    }

    /// Click the jobs tab, falling back to direct navigation.
    pub async fn go_to_jobs_tab(&self) -> Result<()> {
        if self.url_is_jobs_page().await {
            return Ok(());
        }

        if self.page.query_exists(selectors::JOBS_TAB).await {
            let _ = self.page.scroll_into_view(selectors::JOBS_TAB).await;
            let _ = self.page.hover(selectors::JOBS_TAB).await;
            self.pacing.human_delay().await;
            if self.page.click(selectors::JOBS_TAB).await.is_ok() {
                sleep(timing::PAGE_TRANSITION_DELAY).await;
                if self.url_is_jobs_page().await {
                    return Ok(());
                }
                tracing::info!("URL did not change to a jobs page after the tab click");
            }
        }

        tracing::info!("attempting direct navigation to the jobs page");
        match timeout(
            timing::NAVIGATION_TIMEOUT,
            self.page
                .goto(JOBS_HOME_URL, WaitUntil::DomContentLoaded, timing::NAVIGATION_TIMEOUT),
        )
        .await
        {
            Ok(Ok(())) => {
                sleep(timing::PAGE_TRANSITION_DELAY).await;
                if self.url_is_jobs_page().await {
                    return Ok(());
                }
            }
            Ok(Err(err)) => tracing::warn!(error = %err, "direct jobs navigation failed"),
            Err(_) => tracing::warn!("direct jobs navigation timed out"),
        }

        Err(Error::navigation(
            JOBS_HOME_URL,
            "failed to reach the jobs page through any method",
        ))
    }

    /// Iterate listings, applying to each; returns the number of jobs that
    /// produced an outcome row.
    pub async fn process_job_listings(&self, max_jobs: usize) -> Result<usize> {
        let Some(pattern) = self.find_card_pattern().await else {
            tracing::info!("no job listings found in any layout");
            return Ok(0);
        };

        let mut processed = 0;
        let mut index = 1;
        let mut scrolled_for_more = false;

        while processed < max_jobs {
            self.session.pause_point().await?;
            self.check_captcha_or_logout().await?;

            let card = format!("{}:nth-of-type({})", pattern, index);
            if !self.page.query_exists(&card).await {
                if scrolled_for_more {
                    break;
                }
                // One scroll-to-bottom to trigger lazy loading, then give up
                // if nothing new appears.
                self.page.mouse_wheel(0.0, 2_000.0).await.ok();
                sleep(timing::INFINITE_SCROLL_DELAY).await;
                scrolled_for_more = true;
                continue;
            }
            scrolled_for_more = false;
            index += 1;

            match self.process_one_card(&card).await {
                Ok(()) => processed += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!(card, error = %err, "skipping job after processing error");
                    self.tracker.log_activity(
                        "job_application",
                        &format!("skipped listing {}: {}", card, err),
                        ActivityStatus::Info,
                        "LinkedInAgent",
                        "",
                    )?;
                }
            }
        }

        tracing::info!(processed, "finished processing job listings");
        Ok(processed)
    }

    /// Handle one listing card: open it, extract, apply, record. A missing
    /// detail pane or extraction miss triggers at most one page reload
    /// before the job is skipped.
    async fn process_one_card(&self, card: &str) -> Result<()> {
        let mut reloaded = false;
        loop {
            let attempt = async {
                let _ = self.page.scroll_into_view(card).await;
                self.pacing.human_delay().await;
                self.page.click(card).await?;
                sleep(timing::JOB_CARD_LOAD_DELAY).await;

                if !self.details_loaded().await {
                    return Err(Error::element_not_found("job detail pane"));
                }
                self.extract_job_details().await
            };

            match attempt.await {
                Ok(mut job) => {
                    job.application_status = self.apply_to_job(&job).await;
                    self.record_outcome(&job)?;
                    self.check_captcha_or_logout().await?;
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if !reloaded => {
                    tracing::info!(error = %err, "missing elements, reloading the page once");
                    reloaded = true;
                    self.page.reload().await?;
                    sleep(timing::PAGE_TRANSITION_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Read the currently selected job's details from the detail pane.
    ///
    /// Title and company are mandatory; everything else tolerates absence.
    pub async fn extract_job_details(&self) -> Result<JobPosting> {
        let job_title = self.safe_text(JOB_TITLE).await;
        let company = self.safe_text(JOB_COMPANY).await;
        let location = self.safe_text(JOB_LOCATION).await;
        if job_title.is_empty() || company.is_empty() {
            return Err(Error::element_not_found("job title/company in detail pane"));
        }

        let is_easy_apply = self.page.query_exists(selectors::EASY_APPLY_BUTTON).await;
        let recruiter_name = {
            let name = self.safe_text(JOB_RECRUITER).await;
            (!name.is_empty()).then_some(name)
        };
        let recruiter_link = self.page.attribute(JOB_RECRUITER, "href").await.ok().flatten();

        Ok(JobPosting {
            job_title,
            company,
            location,
            is_easy_apply,
            recruiter_name,
            recruiter_link,
            application_status: ApplicationStatus::Skipped,
        })
    }

    /// Decide how to apply and return the resulting status.
    pub async fn apply_to_job(&self, job: &JobPosting) -> ApplicationStatus {
        tracing::info!(job = %job.job_title, company = %job.company, "attempting application");

        if job.is_easy_apply {
            return self.handle_easy_apply().await;
        }

        if self.page.query_exists(selectors::EXTERNAL_APPLY_LINK).await {
            return self.handle_external_apply().await;
        }

        tracing::info!("no apply control found, skipping");
        ApplicationStatus::Skipped
    }

    async fn handle_easy_apply(&self) -> ApplicationStatus {
        let open_modal = async {
            self.page.click(selectors::EASY_APPLY_BUTTON).await?;
            sleep(timing::EASY_APPLY_MODAL_DELAY).await;
            self.form_filler.fill_easy_apply(&self.apply_data).await
        };
        match open_modal.await {
            Ok(EasyApplyOutcome::Applied) => ApplicationStatus::Applied,
            Ok(EasyApplyOutcome::Failed) => ApplicationStatus::Failed,
            Err(err) => {
                tracing::warn!(error = %err, "easy apply failed");
                ApplicationStatus::Failed
            }
        }
    }

    async fn handle_external_apply(&self) -> ApplicationStatus {
        match self
            .page
            .click_expect_popup(selectors::EXTERNAL_APPLY_LINK, timing::POPUP_WAIT_TIMEOUT)
            .await
        {
            Ok(PopupOutcome::PopupOpened) => {
                tracing::info!("external application opened a new tab; closing it");
                if let Err(err) = self.page.close_popup().await {
                    tracing::warn!(error = %err, "failed to close external popup");
                }
                ApplicationStatus::Redirected
            }
            Ok(PopupOutcome::SameTabNavigated) => {
                sleep(timing::PAGE_TRANSITION_DELAY).await;
                if let Err(err) = self.page.go_back().await {
                    tracing::warn!(error = %err, "failed to navigate back after redirect");
                }
                ApplicationStatus::Redirected
            }
            Ok(PopupOutcome::NoEffect) => ApplicationStatus::Failed,
            Err(err) => {
                tracing::warn!(error = %err, "external apply click failed");
                ApplicationStatus::Failed
            }
        }
    }

    /// Append the job row to `jobs_applied.csv` and mirror it into the
    /// activity log. Every extracted job passes through here exactly once.
    pub fn record_outcome(&self, job: &JobPosting) -> Result<()> {
        if let Some(parent) = self.jobs_csv.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let write_header = !self.jobs_csv.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.jobs_csv)
            .map_err(|e| Error::io(&self.jobs_csv, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(job)?;
        writer.flush().map_err(|e| Error::io(&self.jobs_csv, e))?;

        let status = match job.application_status {
            ApplicationStatus::Applied | ApplicationStatus::Redirected => ActivityStatus::Success,
            ApplicationStatus::Skipped => ActivityStatus::Info,
            ApplicationStatus::Failed => ActivityStatus::Failed,
        };
        self.tracker.log_activity(
            "job_application",
            &format!(
                "{} at {}: {}",
                job.job_title, job.company, job.application_status
            ),
            status,
            "LinkedInAgent",
            &mint_job_id(&job.job_title, &job.company),
        )?;
        Ok(())
    }

    /// Raise a named error when the session is blocked by a CAPTCHA or has
    /// been signed out. Neither condition is retried by the controller.
    pub async fn check_captcha_or_logout(&self) -> Result<()> {
        let profile_visible = self
            .page
            .is_visible(selectors::NAV_PROFILE_INDICATOR)
            .await
            .unwrap_or(false);
        if !profile_visible {
            let signin_visible = self
                .page
                .is_visible(selectors::SIGN_IN_INDICATOR)
                .await
                .unwrap_or(false);
            if signin_visible {
                tracing::error!("{}", messages::LOGOUT);
                return Err(Error::LoggedOut);
            }
        }

        if self.page.query_exists(selectors::CAPTCHA_IMAGE).await {
            tracing::error!("{}", messages::CAPTCHA);
            return Err(Error::CaptchaRequired);
        }
        Ok(())
    }

    /// Bounded recovery routine for a known failure kind.
    pub async fn recover_from_error(&self, kind: RecoveryKind) -> bool {
        let outcome = match kind {
            RecoveryKind::Navigation => {
                match self
                    .page
                    .goto(JOBS_HOME_URL, WaitUntil::NetworkIdle, timing::NAVIGATION_TIMEOUT)
                    .await
                {
                    Ok(()) => self.url_is_jobs_page().await,
                    Err(_) => false,
                }
            }
            RecoveryKind::Modal => {
                if self.page.query_exists(selectors::MODAL_CLOSE).await {
                    let closed = self.page.click(selectors::MODAL_CLOSE).await.is_ok();
                    sleep(timing::MODAL_TRANSITION_DELAY).await;
                    closed
                } else {
                    true
                }
            }
            RecoveryKind::Session => {
                if self.page.reload().await.is_err() {
                    false
                } else {
                    sleep(timing::PAGE_TRANSITION_DELAY).await;
                    self.check_captcha_or_logout().await.is_ok()
                }
            }
        };
        tracing::info!(?kind, success = outcome, "recovery routine finished");
        outcome
    }

    /// Drive a plain application form (used by direct job-URL applications):
    /// upload the CV if asked for and submit.
    pub async fn handle_application_form(&self, cv_path: &std::path::Path) -> Result<bool> {
        self.session.pause_point().await?;
        self.page
            .wait_for_selector(
                "form[data-test='application-form']",
                WaitState::Attached,
                self.default_timeout,
            )
            .await?;

        let upload_input = "input[type='file'][accept='.pdf,.doc,.docx']";
        if self.page.query_exists(upload_input).await {
            tracing::info!("uploading CV");
            self.page.set_input_files(upload_input, cv_path).await?;
            self.pacing.human_delay().await;
        }

        let submit = "button[type='submit']";
        if self.page.query_exists(submit).await {
            self.page.click(submit).await?;
            sleep(timing::FORM_SUBMIT_DELAY).await;
            return Ok(true);
        }
        Ok(false)
    }

    // ---- internals ----

    async fn url_is_jobs_page(&self) -> bool {
        let url = self.page.current_url().await.to_lowercase();
        JOBS_URL_PATTERNS.iter().any(|p| url.contains(p))
    }

    async fn details_loaded(&self) -> bool {
        for pane in DETAIL_PANES {
            if self.page.query_exists(pane).await {
                return true;
            }
        }
        false
    }

    async fn find_card_pattern(&self) -> Option<&'static str> {
        for pattern in CARD_PATTERNS {
            let first = format!("{}:nth-of-type(1)", pattern);
            if self.page.query_exists(&first).await {
                return Some(pattern);
            }
        }
        None
    }

    async fn fill_first_match(&self, candidates: &[&str], value: &str) -> bool {
        for selector in candidates {
            if !self.page.query_exists(selector).await {
                continue;
            }
            self.pacing.human_delay().await;
            if self.page.fill(selector, "").await.is_ok()
                && self.page.fill(selector, value).await.is_ok()
            {
                return true;
            }
        }
        false
    }

    async fn trigger_search(&self) -> Result<()> {
        for selector in SEARCH_BUTTONS {
            if self.page.query_exists(selector).await && self.page.click(selector).await.is_ok() {
                return Ok(());
            }
        }
        tracing::info!("search button not found, pressing Enter instead");
        self.page.press_key("Enter").await
    }

    async fn is_narrow_layout(&self) -> bool {
        for indicator in NARROW_INDICATORS {
            if self.page.is_visible(indicator).await.unwrap_or(false) {
                return true;
            }
        }
        self.page
            .evaluate("window.innerWidth")
            .await
            .ok()
            .and_then(|v| v.as_u64())
            .map(|width| width < 768)
            .unwrap_or(false)
    }

    /// Expand the collapsed search UI and run the search through it.
    async fn handle_responsive_search(&self, job_title: &str, location: &str) -> Result<bool> {
        let magnifier = NARROW_INDICATORS[0];
        if !self.page.query_exists(magnifier).await {
            return Ok(false);
        }
        let _ = self.page.scroll_into_view(magnifier).await;
        self.pacing.human_delay().await;
        self.page.click(magnifier).await?;
        sleep(timing::MODAL_TRANSITION_DELAY).await;

        let title_filled = self.fill_first_match(&TITLE_INPUTS, job_title).await;
        let location_filled = self.fill_first_match(&LOCATION_INPUTS, location).await;
        if !title_filled && !location_filled {
            return Ok(false);
        }
        self.trigger_search().await?;
        sleep(timing::SEARCH_RESULTS_DELAY).await;
        Ok(true)
    }

    async fn safe_text(&self, selector: &str) -> String {
        self.page
            .text_content(selector)
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }
}

/// Deterministic internal id for jobs whose platform id is missing.
fn mint_job_id(job_title: &str, company: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_title.as_bytes());
    hasher.update(b"|");
    hasher.update(company.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("job-{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::NullLlm;
    use crate::page::fake::{FakeEffect, FakeElement, FakePage};
    use crate::prompt::NullPrompt;

    struct Harness {
        page: Arc<FakePage>,
        tracker: Arc<ActivityLog>,
        dir: tempfile::TempDir,
        agent: LinkedInAgent,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::at("https://www.linkedin.com/jobs/search?k=x"));
        let tracker = Arc::new(ActivityLog::open(dir.path().join("logs")).unwrap());
        let session = SessionControl::new();
        let form_filler = Arc::new(
            FormFillerAgent::new(
                Arc::clone(&page) as Arc<dyn PageDriver>,
                session.clone(),
                Arc::new(NullLlm),
                Arc::new(NullPrompt),
                dir.path(),
            )
            .with_pacing(Pacing::none()),
        );
        let agent = LinkedInAgent::new(
            Arc::clone(&page) as Arc<dyn PageDriver>,
            Arc::clone(&tracker),
            session,
            form_filler,
            dir.path().join("jobs_applied.csv"),
        )
        .with_pacing(Pacing::none())
        .with_max_jobs(1);

        Harness {
            page,
            tracker,
            dir,
            agent,
        }
    }

    fn signed_in(page: &FakePage) {
        page.add_element(selectors::NAV_PROFILE_INDICATOR, FakeElement::visible());
    }

    fn search_ui(page: &FakePage) {
        page.add_element(TITLE_INPUTS[0], FakeElement::visible());
        page.add_element(LOCATION_INPUTS[0], FakeElement::visible());
        page.add_element(SEARCH_BUTTONS[0], FakeElement::visible());
    }

    /// One listing card whose click reveals the detail pane.
    fn one_card(page: &FakePage, easy_apply: bool) {
        let card = format!("{}:nth-of-type(1)", CARD_PATTERNS[0]);
        page.add_element(&card, FakeElement::visible());
        let mut effects = vec![
            FakeEffect::AddElement(DETAIL_PANES[0].into(), FakeElement::visible()),
            FakeEffect::AddElement(JOB_TITLE.into(), FakeElement::with_text("Software Engineer")),
            FakeEffect::AddElement(JOB_COMPANY.into(), FakeElement::with_text("Acme Corp")),
            FakeEffect::AddElement(JOB_LOCATION.into(), FakeElement::with_text("Remote")),
        ];
        if easy_apply {
            effects.push(FakeEffect::AddElement(
                selectors::EASY_APPLY_BUTTON.into(),
                FakeElement::visible(),
            ));
        }
        page.on_click(&card, effects);
    }

    fn read_jobs_csv(dir: &tempfile::TempDir) -> Vec<JobPosting> {
        let path = dir.path().join("jobs_applied.csv");
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .unwrap();
        reader.deserialize().map(|r| r.unwrap()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_easy_apply_happy_path() {
        let h = harness();
        signed_in(&h.page);
        search_ui(&h.page);
        one_card(&h.page, true);
        // The easy-apply modal: one step with a phone field and submit.
        h.page.on_click(
            selectors::EASY_APPLY_BUTTON,
            vec![
                FakeEffect::AddElement("input[name=\"phoneNumber\"]".into(), FakeElement::visible()),
                FakeEffect::AddElement(selectors::SUBMIT_APPLICATION.into(), FakeElement::visible()),
            ],
        );

        let agent = h.agent.with_apply_data(HashMap::from([(
            "phone".to_string(),
            Value::String("555-0100".into()),
        )]));
        agent
            .search_jobs_and_apply("Software Engineer", "Remote")
            .await
            .unwrap();

        let rows = read_jobs_csv(&h.dir);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].application_status, ApplicationStatus::Applied);
        assert_eq!(rows[0].job_title, "Software Engineer");
        assert!(rows[0].is_easy_apply);

        // The phone field was filled during the modal flow.
        let filled = h.page.lock().filled.clone();
        assert!(filled
            .iter()
            .any(|(sel, v)| sel == "input[name=\"phoneNumber\"]" && v == "555-0100"));

        let log = h.tracker.get_activities(Some("job_application")).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, ActivityStatus::Success);
        assert!(log[0].job_id.starts_with("job-"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_apply_popup_is_closed_and_marked_redirected() {
        let h = harness();
        signed_in(&h.page);
        search_ui(&h.page);
        one_card(&h.page, false);

        // Card click also reveals the external apply link; clicking it opens
        // a popup.
        let card = format!("{}:nth-of-type(1)", CARD_PATTERNS[0]);
        let mut effects = h.page.lock().on_click.get(&card).cloned().unwrap();
        effects.push(FakeEffect::AddElement(
            selectors::EXTERNAL_APPLY_LINK.into(),
            FakeElement::visible(),
        ));
        h.page.on_click(&card, effects);
        h.page.lock().popup_outcomes.insert(
            selectors::EXTERNAL_APPLY_LINK.into(),
            PopupOutcome::PopupOpened,
        );

        h.agent
            .search_jobs_and_apply("Software Engineer", "Remote")
            .await
            .unwrap();

        let rows = read_jobs_csv(&h.dir);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].application_status, ApplicationStatus::Redirected);
        assert_eq!(h.page.lock().popups_closed, 1);
        // No form fields were touched: only the search inputs were filled.
        let filled = h.page.lock().filled.clone();
        assert!(filled.iter().all(|(sel, _)| sel.starts_with("input.jobs-search-box")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_captcha_aborts_with_named_error() {
        let h = harness();
        signed_in(&h.page);
        h.page.add_element(selectors::CAPTCHA_IMAGE, FakeElement::visible());

        let result = h.agent.search_jobs_and_apply("Engineer", "Remote").await;
        assert!(matches!(result, Err(Error::CaptchaRequired)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_sign_in_aborts_as_logged_out() {
        let h = harness();
        h.page.add_element(selectors::SIGN_IN_INDICATOR, FakeElement::visible());

        let result = h.agent.search_jobs_and_apply("Engineer", "Remote").await;
        assert!(matches!(result, Err(Error::LoggedOut)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_jobs_zero_produces_no_rows() {
        let h = harness();
        signed_in(&h.page);
        one_card(&h.page, true);

        let processed = h.agent.process_job_listings(0).await.unwrap();
        assert_eq!(processed, 0);
        assert!(!h.dir.path().join("jobs_applied.csv").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_without_apply_controls_is_skipped() {
        let h = harness();
        signed_in(&h.page);
        search_ui(&h.page);
        one_card(&h.page, false);

        h.agent
            .search_jobs_and_apply("Engineer", "Remote")
            .await
            .unwrap();

        let rows = read_jobs_csv(&h.dir);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].application_status, ApplicationStatus::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_details_reloads_once_then_skips() {
        let h = harness();
        signed_in(&h.page);
        // A card that never reveals a detail pane.
        let card = format!("{}:nth-of-type(1)", CARD_PATTERNS[0]);
        h.page.add_element(&card, FakeElement::visible());

        let processed = h.agent.process_job_listings(1).await.unwrap();
        assert_eq!(processed, 0);
        assert_eq!(h.page.lock().reload_count, 1);
        // The skip was recorded in the activity log.
        let log = h.tracker.get_activities(Some("job_application")).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, ActivityStatus::Info);
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_to_jobs_tab_falls_back_to_direct_navigation() {
        let h = harness();
        h.page.lock().url = "https://www.linkedin.com/feed/".into();

        h.agent.go_to_jobs_tab().await.unwrap();
        assert_eq!(h.page.current_url().await, JOBS_HOME_URL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_to_jobs_tab_prefers_tab_click() {
        let h = harness();
        h.page.lock().url = "https://www.linkedin.com/feed/".into();
        h.page.add_element(selectors::JOBS_TAB, FakeElement::visible());
        h.page.on_click(
            selectors::JOBS_TAB,
            vec![FakeEffect::SetUrl("https://www.linkedin.com/jobs/collections/".into())],
        );

        h.agent.go_to_jobs_tab().await.unwrap();
        assert!(h.page.lock().visited.is_empty());
        assert_eq!(h.page.clicks(), vec![selectors::JOBS_TAB]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_from_modal_error() {
        let h = harness();
        h.page.add_element(selectors::MODAL_CLOSE, FakeElement::visible());
        assert!(h.agent.recover_from_error(RecoveryKind::Modal).await);
        assert_eq!(h.page.clicks(), vec![selectors::MODAL_CLOSE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_from_navigation_error() {
        let h = harness();
        assert!(h.agent.recover_from_error(RecoveryKind::Navigation).await);
        assert_eq!(h.page.current_url().await, JOBS_HOME_URL);
    }

    #[test]
    fn test_minted_job_ids_are_stable_and_distinct() {
        let a = mint_job_id("Engineer", "Acme");
        let b = mint_job_id("Engineer", "Acme");
        let c = mint_job_id("Engineer", "Globex");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("job-"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_responsive_layout_search() {
        let h = harness();
        signed_in(&h.page);
        // Magnifier visible; clicking it reveals the search inputs.
        h.page.add_element(NARROW_INDICATORS[0], FakeElement::visible());
        h.page.on_click(
            NARROW_INDICATORS[0],
            vec![
                FakeEffect::AddElement(TITLE_INPUTS[0].into(), FakeElement::visible()),
                FakeEffect::AddElement(SEARCH_BUTTONS[0].into(), FakeElement::visible()),
            ],
        );
        one_card(&h.page, false);

        h.agent
            .search_jobs_and_apply("Engineer", "Remote")
            .await
            .unwrap();

        let rows = read_jobs_csv(&h.dir);
        assert_eq!(rows.len(), 1);
        let filled = h.page.lock().filled.clone();
        assert!(filled.iter().any(|(sel, v)| sel == TITLE_INPUTS[0] && v == "Engineer"));
    }
}
