//! Matching run: orchestrates one upload from raw files to a stored result.
//!
//! Flow: resolve credential → ingest jobs → ingest CVs → score matrix →
//!       assemble `MatchRun`.
//!
//! The credential is resolved before any document is read, so a run without
//! one never starts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::extraction::{ingest_batch, BatchRole, Document, UploadedFile};
use crate::llm_client::{CompletionService, LlmClient};
use crate::matching::matrix::MatrixBuilder;
use crate::matching::parser::configured_parser;
use crate::matching::scorer::{MatchScorer, SamplingConfig};
use crate::matching::store::{DocumentSummary, MatchRun};

/// Everything the upload form carried.
#[derive(Debug, Default)]
pub struct MatchRequest {
    /// Overrides the configured key for this run only.
    pub api_key: Option<String>,
    pub jobs: Vec<UploadedFile>,
    pub cvs: Vec<UploadedFile>,
}

/// Picks the request's key, falling back to the configured one.
pub fn resolve_api_key(request_key: Option<&str>, config: &Config) -> Result<String, AppError> {
    request_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| config.openai_api_key.clone())
        .ok_or_else(|| {
            AppError::Unauthorized(
                "An OpenAI API key is required: set OPENAI_API_KEY or send an api_key field"
                    .to_string(),
            )
        })
}

/// Builds the scoring pipeline from configuration and a resolved key.
pub fn matrix_builder_for(config: &Config, api_key: String) -> Result<MatrixBuilder, AppError> {
    let llm = LlmClient::new(
        api_key,
        &config.openai_base_url,
        config.openai_model.clone(),
        Duration::from_secs(config.llm_timeout_secs),
        config.llm_max_attempts,
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

    Ok(matrix_builder_with(Arc::new(llm), config))
}

/// Same as `matrix_builder_for` but with any completion backend.
pub fn matrix_builder_with(llm: Arc<dyn CompletionService>, config: &Config) -> MatrixBuilder {
    let scorer = MatchScorer::new(
        llm,
        configured_parser(config.lenient_score_parsing),
        SamplingConfig {
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        },
    );
    MatrixBuilder::new(scorer, config.match_concurrency)
}

/// Runs a full match. Empty batches (before or after extraction) are rejected.
pub async fn run_matching(config: &Config, request: MatchRequest) -> Result<MatchRun, AppError> {
    let api_key = resolve_api_key(request.api_key.as_deref(), config)?;
    let builder = matrix_builder_for(config, api_key)?;
    execute(&builder, request.jobs, request.cvs).await
}

/// Ingests both batches and scores them with the given builder.
pub async fn execute(
    builder: &MatrixBuilder,
    job_files: Vec<UploadedFile>,
    cv_files: Vec<UploadedFile>,
) -> Result<MatchRun, AppError> {
    if job_files.is_empty() {
        return Err(AppError::Validation(
            "Upload at least one job description".to_string(),
        ));
    }
    if cv_files.is_empty() {
        return Err(AppError::Validation("Upload at least one CV".to_string()));
    }

    let jobs = ingest_batch(job_files, BatchRole::Jobs).await;
    let cvs = ingest_batch(cv_files, BatchRole::Cvs).await;

    let mut skipped = jobs.skipped;
    skipped.extend(cvs.skipped);

    if jobs.documents.is_empty() || cvs.documents.is_empty() {
        let reasons: Vec<String> = skipped
            .iter()
            .map(|s| format!("{}: {}", s.filename, s.reason))
            .collect();
        return Err(AppError::Validation(format!(
            "No readable {} left after extraction ({})",
            if jobs.documents.is_empty() {
                "job descriptions"
            } else {
                "CVs"
            },
            reasons.join("; ")
        )));
    }

    let run_id = Uuid::new_v4();
    info!(
        "Starting run {run_id}: {} CV(s), {} job(s), model {}",
        cvs.documents.len(),
        jobs.documents.len(),
        builder.model()
    );

    let cv_summaries = summarize(&cvs.documents);
    let job_summaries = summarize(&jobs.documents);

    let result = builder
        .build(cvs.documents, jobs.documents)
        .await
        .map_err(|e| AppError::Llm(format!("Matching run halted: {e}")))?;

    Ok(MatchRun {
        run_id,
        created_at: Utc::now(),
        model: builder.model().to_string(),
        cvs: cv_summaries,
        jobs: job_summaries,
        result,
        skipped,
    })
}

fn summarize(documents: &[Document]) -> Vec<DocumentSummary> {
    documents
        .iter()
        .map(|d| DocumentSummary {
            name: d.name.clone(),
            kind: d.kind,
            characters: d.content.chars().count(),
        })
        .collect()
}
