//! Bounded fan-out of one API call across (target, project) pairs.
//!
//! Every pair runs as its own tokio task behind a semaphore, so a slow
//! or dead service delays only its own outcome. Results collect into a
//! [`Batch`] keyed by pair, which makes output order the sorted pair
//! order rather than completion order.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Target;
use crate::error::ApiError;

/// Per-pair result of a batch.
pub type Outcome<T> = Result<T, ApiError>;

/// One unit of fan-out work: a resolved target plus the project on it.
#[derive(Debug, Clone)]
pub struct DeployPair {
    pub target: Target,
    pub project: String,
}

impl DeployPair {
    pub fn new(target: Target, project: impl Into<String>) -> Self {
        Self {
            target,
            project: project.into(),
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey {
            target: self.target.name.clone(),
            project: self.project.clone(),
        }
    }
}

impl From<(Target, String)> for DeployPair {
    fn from((target, project): (Target, String)) -> Self {
        Self { target, project }
    }
}

/// Stable identity of a pair inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PairKey {
    pub target: String,
    pub project: String,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Project-less operations leave the project blank.
        if self.project.is_empty() {
            write!(f, "{}", self.target)
        } else {
            write!(f, "{}/{}", self.target, self.project)
        }
    }
}

/// Results of one fan-out. An empty batch counts as ok.
#[derive(Debug)]
pub struct Batch<T> {
    outcomes: BTreeMap<PairKey, Outcome<T>>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self {
            outcomes: BTreeMap::new(),
        }
    }
}

impl<T> Batch<T> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True only when every pair succeeded.
    pub fn ok(&self) -> bool {
        self.outcomes.values().all(Result::is_ok)
    }

    pub fn failed(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_err()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &Outcome<T>)> {
        self.outcomes.iter()
    }

    pub fn get(&self, key: &PairKey) -> Option<&Outcome<T>> {
        self.outcomes.get(key)
    }
}

/// Runs one async operation per pair with bounded concurrency.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    concurrency: usize,
}

impl Dispatcher {
    /// A limit of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Apply `op` to every pair. Pairs never cancel each other; each
    /// failure lands in the batch as that pair's own outcome.
    pub async fn run<T, F, Fut>(&self, pairs: Vec<DeployPair>, op: F) -> Batch<T>
    where
        T: Send + 'static,
        F: Fn(DeployPair) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let keys: Vec<PairKey> = pairs.iter().map(DeployPair::key).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for pair in pairs {
            let semaphore = Arc::clone(&semaphore);
            let op = op.clone();
            tasks.spawn(async move {
                // Never closed while tasks run, so acquire cannot fail.
                let _permit = semaphore.acquire().await.ok();
                let key = pair.key();
                tracing::debug!(pair = %key, "dispatching");
                let outcome = op(pair).await;
                (key, outcome)
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, outcome)) => {
                    outcomes.insert(key, outcome);
                }
                Err(err) => {
                    tracing::error!(error = %err, "dispatch worker failed");
                }
            }
        }

        // A worker that died without reporting still gets an outcome, so
        // the batch always covers every submitted pair.
        for key in keys {
            outcomes.entry(key).or_insert_with(|| {
                Err(ApiError::Protocol {
                    url: String::new(),
                    detail: "dispatch worker terminated before reporting".to_string(),
                })
            });
        }

        Batch { outcomes }
    }
}
