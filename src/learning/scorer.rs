//! Confidence scoring for proposed actions.
//!
//! The score combines the historical success rate with an optional LLM
//! judgement. It is informational: callers decide their own thresholds.

use super::pipeline::{LearningPipeline, DEFAULT_WINDOW};
use crate::error::Result;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::telemetry::TelemetrySink;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Default confidence when no history exists for an action.
pub const BASE_CONFIDENCE: f64 = 0.6;

/// Optional second opinion on the heuristic score.
#[async_trait]
pub trait ConfidenceJudge: Send + Sync {
    /// Return a judgement in `[0, 1]` for the proposed action.
    async fn judge(
        &self,
        action: &str,
        context: &HashMap<String, Value>,
        heuristic: f64,
    ) -> Result<f64>;
}

/// Computes a `[0, 1]` confidence per proposed action.
pub struct ConfidenceScorer {
    pipeline: Arc<LearningPipeline>,
    telemetry: Arc<TelemetrySink>,
    judge: Option<Arc<dyn ConfidenceJudge>>,
    base_confidence: f64,
}

impl ConfidenceScorer {
    pub fn new(pipeline: Arc<LearningPipeline>, telemetry: Arc<TelemetrySink>) -> Self {
        Self {
            pipeline,
            telemetry,
            judge: None,
            base_confidence: BASE_CONFIDENCE,
        }
    }

    /// Attach an LLM judge; without one the heuristic passes through.
    pub fn with_judge(mut self, judge: Arc<dyn ConfidenceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_base_confidence(mut self, base: f64) -> Self {
        self.base_confidence = base.clamp(0.0, 1.0);
        self
    }

    /// Compute the confidence for an action.
    ///
    /// 1. heuristic: `base` with no history, else `(success_rate + base)/2`
    /// 2. optional LLM judgement averaged with the heuristic; judge errors
    ///    fall back to the heuristic alone
    /// 3. clamp to `[0, 1]`
    pub async fn compute(&self, action: &str, context: &HashMap<String, Value>) -> f64 {
        let heuristic = self.heuristic(action);

        let mut score = heuristic;
        if let Some(judge) = &self.judge {
            match judge.judge(action, context, heuristic).await {
                Ok(judged) => score = (heuristic + judged.clamp(0.0, 1.0)) / 2.0,
                Err(err) => {
                    tracing::warn!(action, error = %err, "confidence judge failed; using heuristic");
                }
            }
        }

        let score = score.clamp(0.0, 1.0);
        self.telemetry.track_event(
            "compute_confidence",
            serde_json::json!({ "action": action, "score": score, "context": context }),
            true,
            Some(score),
        );
        score
    }

    fn heuristic(&self, action: &str) -> f64 {
        if self.pipeline.outcome_count(action) == 0 {
            return self.base_confidence;
        }
        let rate = self.pipeline.success_rate(action, DEFAULT_WINDOW);
        (rate + self.base_confidence) / 2.0
    }
}

/// Judge that asks the configured LLM for a number in `[0, 1]`.
pub struct LlmConfidenceJudge {
    llm: Arc<dyn LlmClient>,
    model: Option<String>,
}

impl LlmConfidenceJudge {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl ConfidenceJudge for LlmConfidenceJudge {
    async fn judge(
        &self,
        action: &str,
        context: &HashMap<String, Value>,
        heuristic: f64,
    ) -> Result<f64> {
        let prompt = format!(
            "Rate the likelihood that the browser action '{}' succeeds, given \
             context {} and a historical estimate of {:.2}. \
             Reply with a single number between 0 and 1.",
            action,
            serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string()),
            heuristic,
        );
        let mut request = CompletionRequest::new()
            .with_message(ChatMessage::user(prompt))
            .with_temperature(0.0)
            .with_max_tokens(8);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response = self.llm.complete(request).await?;
        let parsed: f64 = response
            .content
            .trim()
            .parse()
            .map_err(|_| crate::error::Error::Llm(format!("non-numeric judgement: {}", response.content)))?;
        Ok(parsed.clamp(0.0, 1.0))
    }
}
