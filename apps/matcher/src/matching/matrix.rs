//! Matrix Builder: scores every (CV, job) pair and derives the winners.
//!
//! Pairs are numbered in canonical order (CV upload order, then job upload
//! order) before dispatch. Results are slotted back by that number, so ties
//! resolve identically whether scoring runs sequentially or in a pool.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::extraction::Document;
use crate::llm_client::LlmError;
use crate::matching::scorer::{MatchScorer, ScoreOutcome, ScoreStatus};

/// One scored (CV, job) pair.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreEntry {
    pub cv: String,
    pub job: String,
    pub score: u32,
    pub status: ScoreStatus,
    pub explanation: String,
}

/// One job column value within a matrix row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobScore {
    pub job: String,
    pub score: u32,
}

/// A CV's scores against every job, in job upload order.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub cv: String,
    pub scores: Vec<JobScore>,
    /// Job with the highest score; earliest job wins ties.
    pub best_match: Option<String>,
}

/// Full CV x job score table.
#[derive(Debug, Clone, Serialize)]
pub struct MatchMatrix {
    pub jobs: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

/// Best CV for one job; earliest CV wins ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopCandidate {
    pub job: String,
    pub cv: String,
    pub score: u32,
}

/// Everything a completed scoring pass produces.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixResult {
    pub matrix: MatchMatrix,
    pub top_candidates: Vec<TopCandidate>,
    pub entries: Vec<ScoreEntry>,
}

/// Runs the scorer over every pair with at most `concurrency` calls in flight.
pub struct MatrixBuilder {
    scorer: Arc<MatchScorer>,
    concurrency: usize,
}

impl MatrixBuilder {
    pub fn new(scorer: MatchScorer, concurrency: usize) -> Self {
        Self {
            scorer: Arc::new(scorer),
            concurrency: concurrency.max(1),
        }
    }

    pub fn model(&self) -> &str {
        self.scorer.model()
    }

    /// Scores all pairs and assembles the result.
    ///
    /// A failed pair is recorded as score 0 and the run continues. Only a
    /// fatal error (service unreachable, credential rejected) stops the run;
    /// in-flight calls are aborted and the error is returned.
    pub async fn build(
        &self,
        cvs: Vec<Document>,
        jobs: Vec<Document>,
    ) -> Result<MatrixResult, LlmError> {
        let cvs = Arc::new(cvs);
        let jobs = Arc::new(jobs);
        let total = cvs.len() * jobs.len();
        info!(
            "Scoring {} CV(s) x {} job(s) = {} pair(s), concurrency {}",
            cvs.len(),
            jobs.len(),
            total,
            self.concurrency
        );

        let mut pending = (0..cvs.len())
            .flat_map(|c| (0..jobs.len()).map(move |j| (c, j)))
            .enumerate();
        let mut slots: Vec<Option<ScoreOutcome>> = (0..total).map(|_| None).collect();
        let mut in_flight = JoinSet::new();

        loop {
            while in_flight.len() < self.concurrency {
                let Some((index, (c, j))) = pending.next() else {
                    break;
                };
                let scorer = Arc::clone(&self.scorer);
                let cvs = Arc::clone(&cvs);
                let jobs = Arc::clone(&jobs);
                in_flight.spawn(async move {
                    let result = scorer.score(&jobs[j].content, &cvs[c].content).await;
                    (index, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((index, Ok(outcome))) => slots[index] = Some(outcome),
                Ok((index, Err(e))) if e.is_fatal() => {
                    in_flight.abort_all();
                    let (c, j) = (index / jobs.len(), index % jobs.len());
                    warn!(
                        "Halting run: fatal error scoring '{}' against '{}': {e}",
                        cvs[c].name, jobs[j].name
                    );
                    return Err(e);
                }
                Ok((index, Err(e))) => {
                    let (c, j) = (index / jobs.len(), index % jobs.len());
                    warn!(
                        "Scoring '{}' against '{}' failed, recording 0: {e}",
                        cvs[c].name, jobs[j].name
                    );
                    slots[index] = Some(ScoreOutcome::failed(e.to_string()));
                }
                // A panicked task leaves its slot empty; it is filled below.
                Err(e) => warn!("Scoring task did not complete: {e}"),
            }
        }

        let cv_names: Vec<String> = cvs.iter().map(|d| d.name.clone()).collect();
        let job_names: Vec<String> = jobs.iter().map(|d| d.name.clone()).collect();
        let outcomes = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| ScoreOutcome::failed("scoring task aborted")))
            .collect();

        let result = assemble(&cv_names, &job_names, outcomes);
        info!(
            "Scoring complete: {} pair(s), {} failed, {} unparsed",
            result.entries.len(),
            count_status(&result.entries, ScoreStatus::Failed),
            count_status(&result.entries, ScoreStatus::Unparsed)
        );
        Ok(result)
    }
}

fn count_status(entries: &[ScoreEntry], status: ScoreStatus) -> usize {
    entries.iter().filter(|e| e.status == status).count()
}

/// Builds the matrix from outcomes laid out in canonical (CV-major) order.
pub fn assemble(cvs: &[String], jobs: &[String], outcomes: Vec<ScoreOutcome>) -> MatrixResult {
    debug_assert_eq!(outcomes.len(), cvs.len() * jobs.len());

    let mut entries = Vec::with_capacity(outcomes.len());
    for (index, outcome) in outcomes.into_iter().enumerate() {
        let (c, j) = (index / jobs.len(), index % jobs.len());
        entries.push(ScoreEntry {
            cv: cvs[c].clone(),
            job: jobs[j].clone(),
            score: outcome.score,
            status: outcome.status,
            explanation: outcome.explanation,
        });
    }

    let rows = cvs
        .iter()
        .enumerate()
        .map(|(c, cv)| {
            let scores: Vec<JobScore> = jobs
                .iter()
                .enumerate()
                .map(|(j, job)| JobScore {
                    job: job.clone(),
                    score: entries[c * jobs.len() + j].score,
                })
                .collect();
            let best_match = first_max(scores.iter().map(|s| s.score)).map(|j| jobs[j].clone());
            MatrixRow {
                cv: cv.clone(),
                scores,
                best_match,
            }
        })
        .collect::<Vec<_>>();

    let top_candidates = jobs
        .iter()
        .enumerate()
        .filter_map(|(j, job)| {
            let column = rows.iter().map(|row| row.scores[j].score);
            first_max(column).map(|c| TopCandidate {
                job: job.clone(),
                cv: rows[c].cv.clone(),
                score: rows[c].scores[j].score,
            })
        })
        .collect();

    MatrixResult {
        matrix: MatchMatrix {
            jobs: jobs.to_vec(),
            rows,
        },
        top_candidates,
        entries,
    }
}

/// Index of the maximum value; the earliest index wins ties.
fn first_max(values: impl Iterator<Item = u32>) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, value) in values.enumerate() {
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::extraction::DocumentKind;
    use crate::llm_client::{CompletionRequest, CompletionService};
    use crate::matching::parser::StrictLabelParser;
    use crate::matching::scorer::SamplingConfig;

    /// Replies per (job text, cv text). Unknown pairs return `fallback`.
    struct ScriptedCompletion {
        replies: HashMap<(String, String), Result<String, u16>>,
        calls: AtomicUsize,
        /// Delay per call in ms, keyed by CV text; lets tests reorder completions.
        delays: HashMap<String, u64>,
    }

    impl ScriptedCompletion {
        fn new(replies: Vec<(&str, &str, Result<&str, u16>)>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|(job, cv, reply)| {
                        ((job.to_string(), cv.to_string()), reply.map(str::to_string))
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
                delays: HashMap::new(),
            }
        }

        fn with_cv_delay(mut self, cv: &str, ms: u64) -> Self {
            self.delays.insert(cv.to_string(), ms);
            self
        }

        fn lookup(&self, prompt: &str) -> (Option<&Result<String, u16>>, Option<u64>) {
            let reply = self
                .replies
                .iter()
                .find(|((job, cv), _)| {
                    prompt.contains(&format!("Job Description:\n{job}\n"))
                        && prompt.contains(&format!("CV:\n{cv}\n"))
                })
                .map(|(_, reply)| reply);
            let delay = self
                .delays
                .iter()
                .find(|(cv, _)| prompt.contains(&format!("CV:\n{cv}\n")))
                .map(|(_, ms)| *ms);
            (reply, delay)
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (reply, delay) = self.lookup(request.prompt);
            if let Some(ms) = delay {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            match reply {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(status)) => Err(LlmError::Api {
                    status: *status,
                    message: "scripted failure".to_string(),
                }),
                None => Ok("no score here".to_string()),
            }
        }

        fn model(&self) -> &str {
            "scripted-model"
        }
    }

    fn doc(name: &str, content: &str) -> Document {
        Document {
            name: name.to_string(),
            kind: DocumentKind::Pdf,
            content: content.to_string(),
        }
    }

    fn builder(llm: Arc<ScriptedCompletion>, concurrency: usize) -> MatrixBuilder {
        let scorer = MatchScorer::new(llm, Box::new(StrictLabelParser), SamplingConfig::default());
        MatrixBuilder::new(scorer, concurrency)
    }

    fn pct(n: u32) -> Result<String, u16> {
        Ok(format!("Match Percentage: {n}%\nExplanation: scripted"))
    }

    fn two_by_two() -> ScriptedCompletion {
        let replies = vec![
            ("job one", "cv one", pct(90)),
            ("job two", "cv one", pct(10)),
            ("job one", "cv two", pct(20)),
            ("job two", "cv two", pct(80)),
        ];
        ScriptedCompletion {
            replies: replies
                .into_iter()
                .map(|(j, c, r)| ((j.to_string(), c.to_string()), r))
                .collect(),
            calls: AtomicUsize::new(0),
            delays: HashMap::new(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn outcomes(scores: &[u32]) -> Vec<ScoreOutcome> {
        scores
            .iter()
            .map(|&score| ScoreOutcome {
                score,
                status: ScoreStatus::Scored,
                explanation: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_first_max_prefers_earliest_on_tie() {
        assert_eq!(first_max([40, 70, 70, 10].into_iter()), Some(1));
        assert_eq!(first_max([0, 0].into_iter()), Some(0));
        assert_eq!(first_max(std::iter::empty()), None);
    }

    #[test]
    fn test_assemble_two_by_two() {
        let result = assemble(
            &names(&["CV1", "CV2"]),
            &names(&["Job1", "Job2"]),
            outcomes(&[90, 10, 20, 80]),
        );

        assert_eq!(result.entries.len(), 4);
        assert_eq!(result.matrix.rows[0].best_match.as_deref(), Some("Job1"));
        assert_eq!(result.matrix.rows[1].best_match.as_deref(), Some("Job2"));
        assert_eq!(
            result.top_candidates,
            vec![
                TopCandidate {
                    job: "Job1".to_string(),
                    cv: "CV1".to_string(),
                    score: 90
                },
                TopCandidate {
                    job: "Job2".to_string(),
                    cv: "CV2".to_string(),
                    score: 80
                },
            ]
        );
    }

    #[test]
    fn test_top_candidate_tie_goes_to_earlier_cv() {
        let result = assemble(
            &names(&["alice.pdf", "bob.pdf", "carol.pdf"]),
            &names(&["role.txt"]),
            outcomes(&[55, 75, 75]),
        );
        assert_eq!(result.top_candidates[0].cv, "bob.pdf");
        assert_eq!(result.top_candidates[0].score, 75);
    }

    #[test]
    fn test_best_match_tie_goes_to_earlier_job() {
        let result = assemble(
            &names(&["alice.pdf"]),
            &names(&["a.txt", "b.txt", "c.txt"]),
            outcomes(&[30, 60, 60]),
        );
        assert_eq!(result.matrix.rows[0].best_match.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_all_zero_scores_still_pick_first() {
        let result = assemble(&names(&["a", "b"]), &names(&["x"]), outcomes(&[0, 0]));
        assert_eq!(result.matrix.rows[0].best_match.as_deref(), Some("x"));
        assert_eq!(result.top_candidates[0].cv, "a");
    }

    #[test]
    fn test_no_jobs_means_no_best_match() {
        let result = assemble(&names(&["a"]), &[], Vec::new());
        assert!(result.matrix.rows[0].best_match.is_none());
        assert!(result.top_candidates.is_empty());
        assert!(result.entries.is_empty());
    }

    #[tokio::test]
    async fn test_build_end_to_end_two_by_two() {
        let llm = Arc::new(two_by_two());
        let result = builder(llm.clone(), 1)
            .build(
                vec![doc("CV1", "cv one"), doc("CV2", "cv two")],
                vec![doc("Job1", "job one"), doc("Job2", "job two")],
            )
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.entries.len(), 4);
        let row_scores: Vec<Vec<u32>> = result
            .matrix
            .rows
            .iter()
            .map(|r| r.scores.iter().map(|s| s.score).collect())
            .collect();
        assert_eq!(row_scores, vec![vec![90, 10], vec![20, 80]]);
        assert_eq!(result.matrix.rows[0].best_match.as_deref(), Some("Job1"));
        assert_eq!(result.matrix.rows[1].best_match.as_deref(), Some("Job2"));
        assert_eq!(result.top_candidates[0].cv, "CV1");
        assert_eq!(result.top_candidates[0].score, 90);
        assert_eq!(result.top_candidates[1].cv, "CV2");
        assert_eq!(result.top_candidates[1].score, 80);
    }

    #[tokio::test]
    async fn test_entry_count_is_product_of_batch_sizes() {
        let llm = Arc::new(ScriptedCompletion::new(vec![]));
        let cvs = vec![doc("a", "A"), doc("b", "B"), doc("c", "C")];
        let jobs = vec![doc("x", "X"), doc("y", "Y")];

        let result = builder(llm, 2).build(cvs, jobs).await.unwrap();

        assert_eq!(result.entries.len(), 6);
        assert!(result
            .entries
            .iter()
            .all(|e| e.score == 0 && e.status == ScoreStatus::Unparsed));
    }

    #[tokio::test]
    async fn test_pool_keeps_canonical_tie_break() {
        // The first CV answers last, so completion order differs from
        // canonical order. The earlier CV must still win the tie.
        let llm = ScriptedCompletion::new(vec![
            ("slow", "cv one", Ok("Match Percentage: 70%")),
            ("slow", "cv two", Ok("Match Percentage: 70%")),
        ])
        .with_cv_delay("cv one", 30);
        let llm = Arc::new(llm);

        let result = builder(llm, 4)
            .build(
                vec![doc("first.pdf", "cv one"), doc("second.pdf", "cv two")],
                vec![doc("slow.txt", "slow")],
            )
            .await
            .unwrap();

        assert_eq!(result.top_candidates[0].cv, "first.pdf");
        assert_eq!(result.entries[0].cv, "first.pdf");
        assert_eq!(result.entries[1].cv, "second.pdf");
    }

    #[tokio::test]
    async fn test_failed_pair_records_zero_and_continues() {
        let llm = Arc::new(ScriptedCompletion::new(vec![
            ("job", "cv one", Err(500)),
            ("job", "cv two", Ok("Match Percentage: 64%")),
        ]));

        let result = builder(llm, 1)
            .build(
                vec![doc("one.pdf", "cv one"), doc("two.pdf", "cv two")],
                vec![doc("job.txt", "job")],
            )
            .await
            .unwrap();

        assert_eq!(result.entries[0].status, ScoreStatus::Failed);
        assert_eq!(result.entries[0].score, 0);
        assert_eq!(result.entries[1].score, 64);
        assert_eq!(result.top_candidates[0].cv, "two.pdf");
    }

    #[tokio::test]
    async fn test_rejected_credential_halts_run() {
        let llm = Arc::new(ScriptedCompletion::new(vec![
            ("job", "cv one", Err(401)),
            ("job", "cv two", Ok("Match Percentage: 64%")),
        ]));

        let err = builder(llm.clone(), 1)
            .build(
                vec![doc("one.pdf", "cv one"), doc("two.pdf", "cv two")],
                vec![doc("job.txt", "job")],
            )
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        // Sequential run stops before the second pair is sent.
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
