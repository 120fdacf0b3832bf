//! Executor configuration

use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Chain matching strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Backtracking search over every candidate, never misses a match
    #[default]
    Exhaustive,
    /// First in-window candidate per criterion, no backtracking.
    ///
    /// Faster on long histories but misses matches where the earliest
    /// candidate blocks a later criterion that a later candidate would allow.
    Greedy,
}

impl MatchStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "exhaustive" => Some(Self::Exhaustive),
            "greedy" => Some(Self::Greedy),
            _ => None,
        }
    }
}

/// Tuning knobs for [`crate::CohortExecutor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
    pub strategy: MatchStrategy,
    /// Patients per matching task
    pub scan_chunk_size: usize,
    /// Matching tasks in flight at once
    pub max_parallel_chunks: usize,
    /// Deadline for a whole top-level operation
    pub timeout_secs: Option<u64>,
    pub default_page_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::Exhaustive,
            scan_chunk_size: 512,
            max_parallel_chunks: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            timeout_secs: None,
            default_page_size: 100,
        }
    }
}

impl ExecutorConfig {
    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    pub fn with_scan_chunks(mut self, chunk_size: usize, max_parallel: usize) -> Self {
        self.scan_chunk_size = chunk_size;
        self.max_parallel_chunks = max_parallel;
        self
    }

    /// Run `operation` under the configured deadline, if any.
    ///
    /// Dropping the future on expiry cancels pending resolver calls and aborts
    /// queued scan tasks.
    pub async fn deadline<T, F>(&self, operation: F) -> EvalResult<T>
    where
        F: Future<Output = EvalResult<T>>,
    {
        match self.timeout_secs {
            Some(seconds) => tokio::time::timeout(Duration::from_secs(seconds), operation)
                .await
                .map_err(|_| EvalError::timeout(seconds))?,
            None => operation.await,
        }
    }
}
