//! Form-filling agent.
//!
//! Fills heterogeneous form controls from a data/mapping pair, generates
//! cover letters through the LLM seam (with a bounded fallback chain), and
//! drives multi-step easy-apply flows. Error policy is governed by
//! `raise_on_error`: off, per-field failures are logged and the remaining
//! fields are still attempted.

use crate::activity::{ActivityLog, ActivityStatus};
use crate::constants::{selectors, timing};
use crate::error::{Error, Result};
use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::page::{PageDriver, WaitState};
use crate::prompt::OperatorPrompt;
use crate::session::{Pacing, SessionControl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Form-control kind a mapping entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Select,
    Checkbox,
    Radio,
    Upload,
    CoverLetterText,
    CoverLetterUpload,
}

/// One mapping entry: where a datum goes and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub selector: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

impl FieldMapping {
    pub fn new(selector: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            selector: selector.into(),
            kind,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Terminal result of the easy-apply loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EasyApplyOutcome {
    Applied,
    Failed,
}

/// Mapping-driven form filler.
pub struct FormFillerAgent {
    page: Arc<dyn PageDriver>,
    session: SessionControl,
    pacing: Pacing,
    llm: Arc<dyn LlmClient>,
    prompt: Arc<dyn OperatorPrompt>,
    tracker: Option<Arc<ActivityLog>>,
    data_dir: PathBuf,
    default_timeout: Duration,
    raise_on_error: bool,
}

impl FormFillerAgent {
    pub fn new(
        page: Arc<dyn PageDriver>,
        session: SessionControl,
        llm: Arc<dyn LlmClient>,
        prompt: Arc<dyn OperatorPrompt>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            page,
            session,
            pacing: Pacing::human(),
            llm,
            prompt,
            tracker: None,
            data_dir: data_dir.into(),
            default_timeout: timing::DEFAULT_TIMEOUT,
            raise_on_error: false,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<ActivityLog>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout.min(timing::MAX_WAIT_TIME);
        self
    }

    /// Fill a form from `data` using `mapping`.
    pub async fn fill_form(
        &self,
        data: &HashMap<String, Value>,
        mapping: &HashMap<String, FieldMapping>,
    ) -> Result<()> {
        self.session.pause_point().await?;

        for (field_name, value) in data {
            let Some(entry) = mapping.get(field_name) else {
                tracing::debug!(field = field_name, "no mapping for field, skipping");
                continue;
            };

            match self.fill_field(field_name, value, entry).await {
                Ok(()) => {}
                Err(err) => {
                    let detail = format!("error filling field '{}': {}", field_name, err);
                    self.log_form_error(&detail);
                    if self.raise_on_error {
                        return Err(err);
                    }
                }
            }
            sleep(timing::FORM_FIELD_DELAY).await;
        }
        Ok(())
    }

    /// Click the submit control. `Ok(false)` when it was not found and
    /// `raise_on_error` is off.
    pub async fn submit_form(&self, submit_selector: &str) -> Result<bool> {
        self.session.pause_point().await?;
        self.pacing.human_delay().await;

        let submit = async {
            self.page
                .wait_for_selector(submit_selector, WaitState::Visible, self.default_timeout)
                .await?;
            self.page.click(submit_selector).await
        };
        match submit.await {
            Ok(()) => {
                sleep(timing::FORM_SUBMIT_DELAY).await;
                Ok(true)
            }
            Err(err) => {
                self.log_form_error(&format!("could not submit form: {}", err));
                if self.raise_on_error {
                    Err(err)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Drive a multi-step easy-apply modal until submission or a dead end.
    pub async fn fill_easy_apply(
        &self,
        data: &HashMap<String, Value>,
    ) -> Result<EasyApplyOutcome> {
        self.session.pause_point().await?;
        self.upload_cv_if_requested(data).await;

        loop {
            self.session.pause_point().await?;
            self.fill_current_step(data).await;

            if self.page.query_exists(selectors::SUBMIT_APPLICATION).await {
                self.pacing.human_delay().await;
                self.page.click(selectors::SUBMIT_APPLICATION).await?;
                sleep(timing::FORM_SUBMIT_DELAY).await;
                return Ok(EasyApplyOutcome::Applied);
            }

            if self.page.query_exists(selectors::CONTINUE_BUTTON).await {
                self.pacing.human_delay().await;
                self.page.click(selectors::CONTINUE_BUTTON).await?;
                sleep(timing::FORM_FIELD_DELAY).await;
                continue;
            }

            tracing::warn!("no continue or submit button found in easy-apply step");
            return Ok(EasyApplyOutcome::Failed);
        }
    }

    async fn upload_cv_if_requested(&self, data: &HashMap<String, Value>) {
        if !self.page.query_exists(selectors::CV_UPLOAD_INPUT).await {
            return;
        }
        let Some(cv_path) = data.get("cv_path").and_then(Value::as_str) else {
            tracing::warn!("CV upload requested by the form but no cv_path provided");
            return;
        };
        if let Err(err) = self
            .page
            .set_input_files(selectors::CV_UPLOAD_INPUT, Path::new(cv_path))
            .await
        {
            tracing::warn!(error = %err, "CV upload failed");
            return;
        }
        sleep(timing::FILE_UPLOAD_DELAY).await;
    }

    /// Best-effort fill of the fields visible on the current step.
    async fn fill_current_step(&self, data: &HashMap<String, Value>) {
        if let Some(phone) = data.get("phone").and_then(Value::as_str) {
            let phone_selector = "input[name=\"phoneNumber\"]";
            if self.page.query_exists(phone_selector).await {
                self.pacing.human_delay().await;
                if let Err(err) = self.page.fill(phone_selector, phone).await {
                    tracing::warn!(error = %err, "failed to fill phone field");
                }
            }
        }

        if let Some(answer) = data.get("work_authorization").and_then(Value::as_str) {
            let label = format!("label:has-text(\"{}\")", answer);
            if self.page.query_exists(&label).await {
                self.pacing.human_delay().await;
                if let Err(err) = self.page.click(&label).await {
                    tracing::warn!(error = %err, "failed to answer work authorization");
                }
            }
        }

        if let Some(years) = data.get("years_of_experience").and_then(Value::as_str) {
            let select = "select[id*=\"experience\"]";
            if self.page.query_exists(select).await {
                self.pacing.human_delay().await;
                if let Err(err) = self.page.select_option(select, years).await {
                    tracing::warn!(error = %err, "failed to select experience");
                }
            }
        }

        let required_checkbox = "input[type=\"checkbox\"][required]";
        if self.page.query_exists(required_checkbox).await {
            if let Ok(false) = self.page.is_checked(required_checkbox).await {
                self.pacing.human_delay().await;
                if let Err(err) = self.page.click(required_checkbox).await {
                    tracing::warn!(error = %err, "failed to tick required checkbox");
                }
            }
        }
    }

    // ---- per-field handlers ----

    async fn fill_field(&self, field_name: &str, value: &Value, entry: &FieldMapping) -> Result<()> {
        self.pacing.human_delay().await;
        match entry.kind {
            FieldKind::Text => self.handle_text(&entry.selector, value).await,
            FieldKind::Select => self.handle_select(&entry.selector, value).await,
            FieldKind::Checkbox => self.handle_checkbox(&entry.selector, value).await,
            FieldKind::Radio => self.handle_radio(&entry.selector, value).await,
            FieldKind::Upload => {
                self.handle_upload(&entry.selector, value, entry.required).await
            }
            FieldKind::CoverLetterText | FieldKind::CoverLetterUpload => {
                self.handle_cover_letter(entry.kind, &entry.selector, value, entry.required)
                    .await
            }
        }
        .map_err(|err| {
            tracing::debug!(field = field_name, error = %err, "field handler failed");
            err
        })
    }

    async fn handle_text(&self, selector: &str, value: &Value) -> Result<()> {
        self.page
            .wait_for_selector(selector, WaitState::Visible, self.default_timeout)
            .await?;
        self.page.fill(selector, "").await?;
        self.pacing.human_delay().await;
        self.page.type_text(selector, &text_of(value)).await
    }

    async fn handle_select(&self, selector: &str, value: &Value) -> Result<()> {
        self.page
            .wait_for_selector(selector, WaitState::Visible, self.default_timeout)
            .await?;
        self.page.select_option(selector, &text_of(value)).await
    }

    async fn handle_checkbox(&self, selector: &str, value: &Value) -> Result<()> {
        self.page
            .wait_for_selector(selector, WaitState::Visible, self.default_timeout)
            .await?;
        let desired = value.as_bool().unwrap_or(false);
        let current = self.page.is_checked(selector).await?;
        if desired != current {
            self.page.click(selector).await?;
        }
        Ok(())
    }

    async fn handle_radio(&self, base_selector: &str, value: &Value) -> Result<()> {
        let radio = format!("{}[value='{}']", base_selector, text_of(value));
        self.page
            .wait_for_selector(&radio, WaitState::Visible, self.default_timeout)
            .await?;
        self.page.click(&radio).await
    }

    async fn handle_upload(&self, selector: &str, value: &Value, required: bool) -> Result<()> {
        let mut path = PathBuf::from(text_of(value));
        if !path.exists() {
            if required {
                let answer = self.prompt.prompt_line(
                    "Required file not found. Please provide a valid file path or press Enter to skip:",
                )?;
                let replacement = PathBuf::from(answer.trim());
                if !answer.trim().is_empty() && replacement.exists() {
                    path = replacement;
                } else {
                    tracing::warn!("skipping upload, no valid file was provided");
                    return Ok(());
                }
            } else {
                tracing::warn!(path = %path.display(), "file to upload not found, skipping");
                return Ok(());
            }
        }

        self.page
            .wait_for_selector(selector, WaitState::Attached, self.default_timeout)
            .await?;
        self.page.set_input_files(selector, &path).await?;
        sleep(timing::FILE_UPLOAD_DELAY).await;
        Ok(())
    }

    async fn handle_cover_letter(
        &self,
        kind: FieldKind,
        selector: &str,
        value: &Value,
        required: bool,
    ) -> Result<()> {
        let Some(cover_text) = self.resolve_cover_letter(value, required).await? else {
            self.log_form_error("no cover letter generated or provided; skipping field");
            return Ok(());
        };

        match kind {
            FieldKind::CoverLetterText => {
                self.handle_text(selector, &Value::String(cover_text)).await
            }
            FieldKind::CoverLetterUpload => {
                std::fs::create_dir_all(&self.data_dir)
                    .map_err(|e| Error::io(&self.data_dir, e))?;
                let temp_path = self
                    .data_dir
                    .join(format!("cover_letter_{}.txt", uuid::Uuid::new_v4()));
                std::fs::write(&temp_path, &cover_text).map_err(|e| Error::io(&temp_path, e))?;

                let result = async {
                    self.page
                        .wait_for_selector(selector, WaitState::Attached, self.default_timeout)
                        .await?;
                    self.page.set_input_files(selector, &temp_path).await
                }
                .await;

                if let Err(err) = std::fs::remove_file(&temp_path) {
                    tracing::debug!(error = %err, "could not remove temp cover letter");
                }
                result
            }
            _ => unreachable!("cover-letter handler called for other kinds"),
        }
    }

    /// Produce cover-letter text: direct strings pass through; job maps go
    /// to the LLM with one retry; a required field that still has nothing
    /// asks the operator exactly once.
    async fn resolve_cover_letter(&self, value: &Value, required: bool) -> Result<Option<String>> {
        if let Some(text) = value.as_str() {
            return Ok(Some(text.to_string()));
        }

        let Some(map) = value.as_object() else {
            return Ok(None);
        };
        let job_title = map.get("job_title").and_then(Value::as_str).unwrap_or("N/A");
        let job_description = map
            .get("job_description")
            .and_then(Value::as_str)
            .unwrap_or("");

        for attempt in 0..2u32 {
            match self.generate_cover_letter(job_title, job_description).await {
                Ok(text) if !text.trim().is_empty() => return Ok(Some(text)),
                Ok(_) => tracing::warn!(attempt, "cover letter generation returned empty text"),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "cover letter generation failed")
                }
            }
        }

        if required {
            let answer = self.prompt.prompt_line(
                "Cover letter is required but generation failed twice. Please paste cover letter text:",
            )?;
            if !answer.is_empty() {
                return Ok(Some(answer));
            }
        }
        Ok(None)
    }

    /// One LLM call for a concise cover letter.
    pub async fn generate_cover_letter(
        &self,
        job_title: &str,
        job_description: &str,
    ) -> Result<String> {
        let prompt = format!(
            "Write a concise but effective cover letter for a position:\n\
             Job Title: {}\nJob Description: {}\n\
             Keep it professional, 200 words or fewer.",
            job_title, job_description
        );
        let request = CompletionRequest::new()
            .with_message(ChatMessage::user(prompt))
            .with_temperature(0.7)
            .with_max_tokens(400);
        let response = self.llm.complete(request).await?;
        Ok(response.content.trim().to_string())
    }

    fn log_form_error(&self, detail: &str) {
        tracing::warn!("{}", detail);
        if let Some(tracker) = &self.tracker {
            let _ = tracker.log_activity(
                "form_error",
                detail,
                ActivityStatus::Error,
                "FormFiller",
                "",
            );
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
