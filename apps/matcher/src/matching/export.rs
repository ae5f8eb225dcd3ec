//! CSV export for the two downloadable tables.

use anyhow::{Context, Result};
use csv::Writer;

use crate::matching::matrix::{MatchMatrix, TopCandidate};

pub const MATRIX_FILENAME: &str = "cv_match_matrix.csv";
pub const TOP_CANDIDATES_FILENAME: &str = "top_candidates_per_job.csv";

/// Scores are shown as percentages in both tables.
fn percent(score: u32) -> String {
    format!("{score}%")
}

/// Columns: `CV`, one per job in upload order, `Best Match`.
pub fn matrix_csv(matrix: &MatchMatrix) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(matrix.jobs.len() + 2);
    header.push("CV");
    header.extend(matrix.jobs.iter().map(String::as_str));
    header.push("Best Match");
    writer.write_record(&header)?;

    for row in &matrix.rows {
        let mut record = Vec::with_capacity(row.scores.len() + 2);
        record.push(row.cv.clone());
        record.extend(row.scores.iter().map(|s| percent(s.score)));
        record.push(row.best_match.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }

    finish(writer)
}

/// Columns: `Job`, `Best Candidate`, `Score`.
pub fn top_candidates_csv(top: &[TopCandidate]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["Job", "Best Candidate", "Score"])?;
    for candidate in top {
        writer.write_record([
            candidate.job.as_str(),
            candidate.cv.as_str(),
            percent(candidate.score).as_str(),
        ])?;
    }
    finish(writer)
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV writer: {e}"))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}
