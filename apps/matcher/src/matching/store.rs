//! In-memory store of recent runs so their tables can be downloaded later.
//! Bounded: once `capacity` runs are held, the oldest is evicted.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::extraction::{DocumentKind, SkippedDocument};
use crate::matching::matrix::MatrixResult;

/// Name, kind and size of an ingested document, reported with the run.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub kind: DocumentKind,
    pub characters: usize,
}

/// A completed matching run.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRun {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub cvs: Vec<DocumentSummary>,
    pub jobs: Vec<DocumentSummary>,
    #[serde(flatten)]
    pub result: MatrixResult,
    pub skipped: Vec<SkippedDocument>,
}

#[derive(Clone)]
pub struct RunStore {
    runs: Arc<RwLock<VecDeque<Arc<MatchRun>>>>,
    capacity: usize,
}

impl RunStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub async fn insert(&self, run: MatchRun) -> Arc<MatchRun> {
        let run = Arc::new(run);
        let mut runs = self.runs.write().await;
        while runs.len() >= self.capacity {
            runs.pop_front();
        }
        runs.push_back(Arc::clone(&run));
        run
    }

    pub async fn get(&self, run_id: Uuid) -> Option<Arc<MatchRun>> {
        self.runs
            .read()
            .await
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned()
    }
}
