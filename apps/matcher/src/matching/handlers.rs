//! Axum route handlers for the Matching API.

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::UploadedFile;
use crate::matching::export::{
    matrix_csv, top_candidates_csv, MATRIX_FILENAME, TOP_CANDIDATES_FILENAME,
};
use crate::matching::runner::{run_matching, MatchRequest};
use crate::matching::store::MatchRun;
use crate::state::AppState;

/// Reads the upload form: repeated `jobs` and `cvs` file fields, optional `api_key`.
/// Unknown fields are ignored.
async fn read_match_form(mut multipart: Multipart) -> Result<MatchRequest, AppError> {
    let mut request = MatchRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "api_key" => {
                let key = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Malformed api_key field: {e}")))?;
                request.api_key = Some(key);
            }
            "jobs" | "cvs" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read upload '{filename}': {e}"))
                })?;
                let file = UploadedFile { filename, data };
                if field_name == "jobs" {
                    request.jobs.push(file);
                } else {
                    request.cvs.push(file);
                }
            }
            _ => {}
        }
    }

    Ok(request)
}

/// POST /api/v1/match
///
/// Scores every uploaded CV against every uploaded job description and
/// stores the run for CSV download.
pub async fn handle_match(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<MatchRun>, AppError> {
    let request = read_match_form(multipart).await?;
    info!(
        "Match request: {} job file(s), {} CV file(s)",
        request.jobs.len(),
        request.cvs.len()
    );

    let run = run_matching(&state.config, request).await?;
    let run = state.runs.insert(run).await;

    Ok(Json(run.as_ref().clone()))
}

/// GET /api/v1/runs/:id
pub async fn handle_get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<MatchRun>, AppError> {
    let run = find_run(&state, run_id).await?;
    Ok(Json(run.as_ref().clone()))
}

/// GET /api/v1/runs/:id/matrix.csv
pub async fn handle_matrix_csv(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let run = find_run(&state, run_id).await?;
    let body = matrix_csv(&run.result.matrix)?;
    Ok(csv_attachment(MATRIX_FILENAME, body))
}

/// GET /api/v1/runs/:id/top_candidates.csv
pub async fn handle_top_candidates_csv(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let run = find_run(&state, run_id).await?;
    let body = top_candidates_csv(&run.result.top_candidates)?;
    Ok(csv_attachment(TOP_CANDIDATES_FILENAME, body))
}

async fn find_run(state: &AppState, run_id: Uuid) -> Result<std::sync::Arc<MatchRun>, AppError> {
    state
        .runs
        .get(run_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Run {run_id} not found")))
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
