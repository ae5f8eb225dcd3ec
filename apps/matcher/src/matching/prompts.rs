// Prompt constants for CV-to-job scoring.
// Reuses the shared system instruction from llm_client::prompts.

/// Opening instruction of the scoring prompt.
pub const MATCH_INSTRUCTION: &str = "You are an HR assistant. Compare the following CV and job description. \
Return a match percentage (0\u{2013}100) and a short explanation.";

/// Required response shape. `parser::StrictLabelParser` reads the first line.
pub const MATCH_RESPONSE_FORMAT: &str = "Respond in this format only:
Match Percentage: XX%
Explanation: ...";

/// Builds the scoring prompt with both texts embedded verbatim.
///
/// Assembled with `format!` rather than placeholder replacement so that
/// document text containing brace placeholders is never re-expanded.
pub fn build_match_prompt(jd_text: &str, cv_text: &str) -> String {
    format!(
        "\n{MATCH_INSTRUCTION}\n\nJob Description:\n{jd_text}\n\nCV:\n{cv_text}\n\n{MATCH_RESPONSE_FORMAT}\n"
    )
}
