//! Match Scorer: one completion call per (job description, CV) pair.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm_client::prompts::HR_ASSISTANT_SYSTEM;
use crate::llm_client::{CompletionRequest, CompletionService, LlmError};
use crate::matching::parser::ScoreParser;
use crate::matching::prompts::build_match_prompt;

/// Highest valid score. Anything above it is treated as unparseable.
pub const MAX_SCORE: u32 = 100;

/// How a score was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    /// The parser found an in-range percentage.
    Scored,
    /// The model answered but no usable percentage was found; score is 0.
    Unparsed,
    /// The call itself failed; score is 0.
    Failed,
}

/// Score and explanation for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub score: u32,
    pub status: ScoreStatus,
    /// Raw model response, or the error message when the call failed.
    pub explanation: String,
}

impl ScoreOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            score: 0,
            status: ScoreStatus::Failed,
            explanation: reason.into(),
        }
    }
}

/// Sampling settings sent with each scoring call.
#[derive(Debug, Clone, Copy)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 500,
        }
    }
}

/// Scores a CV against a job description through the completion service.
pub struct MatchScorer {
    llm: Arc<dyn CompletionService>,
    parser: Box<dyn ScoreParser>,
    sampling: SamplingConfig,
}

impl MatchScorer {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        parser: Box<dyn ScoreParser>,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            llm,
            parser,
            sampling,
        }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Sends one prompt and reads the score out of the answer.
    /// Transport and API errors propagate; the caller decides whether they are fatal.
    pub async fn score(&self, jd_text: &str, cv_text: &str) -> Result<ScoreOutcome, LlmError> {
        let prompt = build_match_prompt(jd_text, cv_text);
        let request = CompletionRequest {
            system: HR_ASSISTANT_SYSTEM,
            prompt: &prompt,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
        };

        let response = self.llm.complete(&request).await?;
        Ok(self.interpret(response))
    }

    fn interpret(&self, response: String) -> ScoreOutcome {
        match self.parser.parse(&response) {
            Some(score) if score <= MAX_SCORE => ScoreOutcome {
                score,
                status: ScoreStatus::Scored,
                explanation: response,
            },
            found => {
                debug!(
                    "{} parser found no usable score (got {:?})",
                    self.parser.name(),
                    found
                );
                ScoreOutcome {
                    score: 0,
                    status: ScoreStatus::Unparsed,
                    explanation: response,
                }
            }
        }
    }
}
