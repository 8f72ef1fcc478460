//! Session controller.
//!
//! Owns the agents and the task manager, wires them to shared collaborators
//! (activity log, session control, learning pipeline, telemetry), and runs
//! whole platform flows under the configured retry policy. Fatal
//! classifications (configuration, logged-out, CAPTCHA) abort a flow
//! without further retries.

use crate::activity::{ActivityLog, ActivityStatus};
use crate::agents::credentials::CredentialsAgent;
use crate::agents::cv_parser::{CvParserAgent, DocumentTextExtractor, PlainTextExtractor};
use crate::agents::form_filler::FormFillerAgent;
use crate::agents::linkedin::LinkedInAgent;
use crate::agents::navigator::NavigationAgent;
use crate::agents::profile::{ProfileBackend, UserProfileStore};
use crate::config::Settings;
use crate::constants::{messages, selectors};
use crate::error::Result;
use crate::learning::{ConfidenceScorer, LearningPipeline};
use crate::llm::{LlmClient, NullLlm};
use crate::page::PageDriver;
use crate::prompt::{OperatorPrompt, StdinPrompt};
use crate::retry::RetryPolicy;
use crate::session::{Pacing, SessionControl, SessionState};
use crate::solver::{CaptchaSolver, NullSolver};
use crate::tasks::{TaskKind, TaskManager};
use crate::telemetry::TelemetrySink;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::time::sleep;

const AGENT_NAME: &str = "Controller";

/// Platforms the controller can drive. A closed family by design; new
/// platforms plug in here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    LinkedIn,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkedIn => write!(f, "linkedin"),
        }
    }
}

/// Builder for a fully wired controller.
pub struct ControllerBuilder {
    settings: Settings,
    page: Arc<dyn PageDriver>,
    llm: Arc<dyn LlmClient>,
    solver: Arc<dyn CaptchaSolver>,
    prompt: Arc<dyn OperatorPrompt>,
    extractor: Arc<dyn DocumentTextExtractor>,
    pacing: Option<Pacing>,
    apply_data: HashMap<String, Value>,
}

impl ControllerBuilder {
    pub fn new(settings: Settings, page: Arc<dyn PageDriver>) -> Self {
        Self {
            settings,
            page,
            llm: Arc::new(NullLlm),
            solver: Arc::new(NullSolver),
            prompt: Arc::new(StdinPrompt),
            extractor: Arc::new(PlainTextExtractor),
            pacing: None,
            apply_data: HashMap::new(),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_solver(mut self, solver: Arc<dyn CaptchaSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn OperatorPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentTextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Override the human-pacing distribution (tests use zero pacing).
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Pre-filled answers handed to easy-apply forms.
    pub fn with_apply_data(mut self, data: HashMap<String, Value>) -> Self {
        self.apply_data = data;
        self
    }

    pub fn build(self) -> Result<Controller> {
        let settings = self.settings;
        settings.ensure_data_dirs()?;

        let pacing = self.pacing.unwrap_or_else(|| {
            Pacing::new(settings.platform.min_delay, settings.platform.max_delay)
        });
        let session = SessionControl::new();
        let tracker = Arc::new(ActivityLog::open(settings.logs_dir())?);
        let telemetry = Arc::new(TelemetrySink::new(
            settings.telemetry.storage_path.clone(),
            settings.telemetry.enabled,
        ));
        let learning = Arc::new(LearningPipeline::new());
        let scorer = Arc::new(ConfidenceScorer::new(
            Arc::clone(&learning),
            Arc::clone(&telemetry),
        ));

        let navigator = Arc::new(
            NavigationAgent::new(Arc::clone(&self.page), session.clone())
                .with_pacing(pacing)
                .with_default_timeout(settings.platform.default_timeout)
                .with_retry_policy(settings.flow_retry_policy()),
        );
        let credentials = Arc::new(
            CredentialsAgent::new(
                settings.captcha.clone(),
                settings.system.data_dir.clone(),
                self.solver,
                Arc::clone(&self.prompt),
                session.clone(),
            )
            .with_pacing(pacing)
            .with_default_timeout(settings.platform.default_timeout)
            .with_attach_existing(settings.browser.attach_existing),
        );
        let form_filler = Arc::new(
            FormFillerAgent::new(
                Arc::clone(&self.page),
                session.clone(),
                Arc::clone(&self.llm),
                Arc::clone(&self.prompt),
                settings.system.data_dir.clone(),
            )
            .with_pacing(pacing)
            .with_tracker(Arc::clone(&tracker))
            .with_default_timeout(settings.platform.default_timeout),
        );
        let linkedin = Arc::new(
            LinkedInAgent::new(
                Arc::clone(&self.page),
                Arc::clone(&tracker),
                session.clone(),
                Arc::clone(&form_filler),
                settings.system.data_dir.join("jobs_applied.csv"),
            )
            .with_pacing(pacing)
            .with_default_timeout(settings.platform.default_timeout)
            .with_apply_data(self.apply_data),
        );
        let cv_parser = Arc::new(CvParserAgent::new(self.extractor));
        let profiles = Arc::new(UserProfileStore::new(
            settings.profiles_dir(),
            ProfileBackend::Csv,
        )?);
        let tasks = TaskManager::new(Arc::clone(&tracker));
        let retry = settings.flow_retry_policy();

        Ok(Controller {
            settings,
            session,
            tracker,
            telemetry,
            learning,
            scorer,
            navigator,
            credentials,
            form_filler,
            linkedin,
            cv_parser,
            profiles,
            tasks,
            retry,
            page: self.page,
        })
    }
}

/// Coordinates the automation flow across the agents.
pub struct Controller {
    settings: Settings,
    session: SessionControl,
    tracker: Arc<ActivityLog>,
    telemetry: Arc<TelemetrySink>,
    learning: Arc<LearningPipeline>,
    scorer: Arc<ConfidenceScorer>,
    navigator: Arc<NavigationAgent>,
    credentials: Arc<CredentialsAgent>,
    form_filler: Arc<FormFillerAgent>,
    linkedin: Arc<LinkedInAgent>,
    cv_parser: Arc<CvParserAgent>,
    profiles: Arc<UserProfileStore>,
    tasks: TaskManager,
    retry: RetryPolicy,
    page: Arc<dyn PageDriver>,
}

impl Controller {
    pub fn builder(settings: Settings, page: Arc<dyn PageDriver>) -> ControllerBuilder {
        ControllerBuilder::new(settings, page)
    }

    /// Begin an automation session.
    pub async fn start_session(&self) -> Result<()> {
        self.session.mark_started();
        match self.tracker.log_activity(
            "session",
            "Session started",
            ActivityStatus::Success,
            AGENT_NAME,
            "",
        ) {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::error!(error = %err, "session failed to start");
                Err(err)
            }
        }
    }

    /// End the session and release cooperative work.
    pub async fn end_session(&self) -> Result<()> {
        self.tracker.log_activity(
            "session",
            "Session ended by user or completion of tasks",
            ActivityStatus::Success,
            AGENT_NAME,
            "",
        )?;
        self.session.stop();
        Ok(())
    }

    /// Raise the shared pause flag; agents suspend at their next
    /// cooperative point.
    pub async fn pause_session(&self) -> Result<()> {
        self.session.pause();
        self.tracker
            .log_activity("session", messages::PAUSE, ActivityStatus::Info, AGENT_NAME, "")?;
        Ok(())
    }

    /// Clear the pause flag.
    pub async fn resume_session(&self) -> Result<()> {
        self.session.resume();
        self.tracker
            .log_activity("session", messages::RESUME, ActivityStatus::Info, AGENT_NAME, "")?;
        Ok(())
    }

    /// Run the whole search-and-apply flow for a platform, retrying
    /// transient failures with exponential backoff.
    pub async fn run_platform_flow(
        &self,
        platform: Platform,
        job_title: &str,
        location: &str,
    ) -> Result<()> {
        let agent = match platform {
            Platform::LinkedIn => Arc::clone(&self.linkedin),
        };
        let confidence = self
            .scorer
            .compute(
                "job_search_apply",
                &HashMap::from([(
                    "platform".to_string(),
                    Value::String(platform.to_string()),
                )]),
            )
            .await;

        let mut attempt: u32 = 0;
        loop {
            let deferred = {
                let agent = Arc::clone(&agent);
                let job_title = job_title.to_string();
                let location = location.to_string();
                async move {
                    agent.search_jobs_and_apply(&job_title, &location).await?;
                    Ok(Value::Null)
                }
                .boxed()
            };
            let task = self.tasks.create(deferred, None)?;
            self.session.set_current_task(Some(task.task_id.clone()));
            let result = self.tasks.run(&task.task_id).await;
            self.session.set_current_task(None);

            match result {
                Ok(_) => {
                    self.tracker.log_activity(
                        "job_search_apply",
                        messages::SUCCESS,
                        ActivityStatus::Success,
                        AGENT_NAME,
                        "",
                    )?;
                    self.learning
                        .record("job_search_apply", true, confidence, HashMap::new());
                    return Ok(());
                }
                Err(err) => {
                    attempt += 1;
                    self.tracker.log_activity(
                        "job_search_apply",
                        &messages::retry(attempt, self.retry.max_retries, &err),
                        ActivityStatus::Error,
                        AGENT_NAME,
                        "",
                    )?;

                    if err.is_fatal() {
                        self.learning
                            .record("job_search_apply", false, confidence, HashMap::new());
                        return Err(err);
                    }
                    if attempt >= self.retry.max_retries {
                        self.tracker.log_activity(
                            "job_search_apply",
                            messages::MAX_RETRIES_REACHED,
                            ActivityStatus::Failed,
                            AGENT_NAME,
                            "",
                        )?;
                        self.learning
                            .record("job_search_apply", false, confidence, HashMap::new());
                        return Err(err);
                    }
                    sleep(self.retry.delay_for_attempt(attempt - 1)).await;
                }
            }
        }
    }

    /// Handle one complete job application: prepare the CV, navigate to the
    /// posting and drive the application form.
    pub async fn apply_to_job(&self, job_url: &str, cv_path: &Path) -> Result<bool> {
        let (cv_path, cv_data) = self.cv_parser.prepare_cv(cv_path).await?;
        self.tracker.log_activity(
            "document",
            &format!("Processed CV: {}", cv_data.filename),
            ActivityStatus::Info,
            AGENT_NAME,
            "",
        )?;

        self.navigator.navigate_to(job_url).await?;

        let submitted = match self.linkedin.handle_application_form(&cv_path).await {
            Ok(submitted) => submitted,
            Err(err) => {
                self.tracker.log_activity(
                    "application",
                    &format!("Error in application: {}", err),
                    ActivityStatus::Error,
                    AGENT_NAME,
                    "",
                )?;
                return if err.is_fatal() { Err(err) } else { Ok(false) };
            }
        };

        self.tracker.log_activity(
            "application",
            &format!(
                "Application {}: {}",
                if submitted { "submitted" } else { "failed" },
                job_url
            ),
            if submitted {
                ActivityStatus::Success
            } else {
                ActivityStatus::Error
            },
            AGENT_NAME,
            "",
        )?;
        self.learning
            .record("apply_to_job", submitted, 1.0, HashMap::new());
        Ok(submitted)
    }

    /// Dispatch a task enqueued by name.
    ///
    /// Recognised kinds run their flow; reserved and unknown kinds are
    /// logged and dropped without raising.
    pub async fn run_named_task(&self, task_type: &str, params: Value) -> Result<()> {
        match TaskKind::parse(task_type) {
            Some(TaskKind::JobSearch) => {
                let job_title = params
                    .get("job_title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let location = params
                    .get("location")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.run_platform_flow(Platform::LinkedIn, &job_title, &location)
                    .await
            }
            Some(TaskKind::Captcha) => {
                let solution = self
                    .credentials
                    .handle_captcha(self.page.as_ref(), selectors::CAPTCHA_IMAGE)
                    .await?;
                self.tracker.log_activity(
                    "captcha",
                    &format!("captcha task resolved: solved={}", solution.is_some()),
                    ActivityStatus::Info,
                    AGENT_NAME,
                    "",
                )?;
                Ok(())
            }
            Some(kind) if kind.is_reserved() => {
                self.tracker.log_activity(
                    "task",
                    &format!("reserved task type '{}' has no consumer, dropped", task_type),
                    ActivityStatus::Info,
                    "TaskManager",
                    "",
                )?;
                Ok(())
            }
            _ => {
                self.tracker.log_activity(
                    "task",
                    &format!("unknown task type '{}', dropped", task_type),
                    ActivityStatus::Info,
                    "TaskManager",
                    "",
                )?;
                Ok(())
            }
        }
    }

    // ---- accessors for the front-ends ----

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn tracker(&self) -> &Arc<ActivityLog> {
        &self.tracker
    }

    pub fn telemetry(&self) -> &Arc<TelemetrySink> {
        &self.telemetry
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn form_filler(&self) -> &Arc<FormFillerAgent> {
        &self.form_filler
    }

    pub fn profiles(&self) -> &Arc<UserProfileStore> {
        &self.profiles
    }

    pub fn learning(&self) -> &Arc<LearningPipeline> {
        &self.learning
    }
}
