// CV-to-job matching: prompt, score parsing, pair scoring, matrix assembly,
// CSV export and the in-memory run store.
// All LLM calls go through llm_client: no direct HTTP calls here.

pub mod export;
pub mod handlers;
pub mod matrix;
pub mod parser;
pub mod prompts;
pub mod runner;
pub mod scorer;
pub mod store;
