//! # Execution Engine
//!
//! Applies compiled CONSTRUCT queries and in-place UPDATEs against the
//! store, measures the triple delta of each application, and drives the
//! per-rules-file inner fixed point.
//!
//! A failing query or update never aborts an inference run: the failure is
//! recorded (see [`RuleEngine::failures`]) and evaluation continues.
//! Callers wanting fail-fast use the `Result`-returning operations
//! directly.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::compiler::CompiledRule;
use crate::store::{GraphStore, StoreError, StoreResult};

/// How many newly derived triples a diff trace prints verbatim.
const DIFF_SAMPLE_LIMIT: usize = 20;

/// Result of applying one query or update.
#[derive(Debug, Clone, Copy)]
pub struct ApplyOutcome {
    /// Triples added to the store (always 0 for updates; duplicates
    /// contribute nothing)
    pub new_triples: usize,
    pub elapsed: Duration,
}

/// Result of running one rules file to its inner fixed point.
#[derive(Debug, Clone)]
pub struct ConvergenceStats {
    pub iterations: usize,
    pub new_triples: usize,
    pub converged: bool,
    /// Triples added per iteration, in order
    pub deltas: Vec<usize>,
}

/// Applies compiled queries against a store and tracks failures.
pub struct RuleEngine {
    iteration_limit: usize,
    debug_diff: bool,
    failures: Vec<StoreError>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(100, false)
    }
}

impl RuleEngine {
    pub fn new(iteration_limit: usize, debug_diff: bool) -> Self {
        RuleEngine {
            iteration_limit,
            debug_diff,
            failures: Vec::new(),
        }
    }

    /// Execute a CONSTRUCT query and insert every produced triple into the
    /// default graph. The delta is post-count minus pre-count, so
    /// rederived duplicates count as zero.
    pub fn apply_construct(
        &self,
        store: &GraphStore,
        sparql: &str,
    ) -> StoreResult<ApplyOutcome> {
        let started = Instant::now();
        let before = store.count()?;

        for triple in store.construct(sparql)? {
            store.add_triple(triple)?;
        }

        let new_triples = store.count()?.saturating_sub(before);
        Ok(ApplyOutcome {
            new_triples,
            elapsed: started.elapsed(),
        })
    }

    /// Execute a SPARQL UPDATE. The reported delta is always 0: updates may
    /// both add and remove triples and their net effect is not tracked.
    pub fn apply_update(&self, store: &GraphStore, sparql: &str) -> StoreResult<ApplyOutcome> {
        let started = Instant::now();
        store.update(sparql)?;
        Ok(ApplyOutcome {
            new_triples: 0,
            elapsed: started.elapsed(),
        })
    }

    /// Apply `rules` in order, repeatedly, until one full pass adds zero
    /// triples or the iteration cap is hit.
    pub fn run_to_convergence(
        &mut self,
        store: &GraphStore,
        rules: &[CompiledRule],
    ) -> StoreResult<ConvergenceStats> {
        let mut deltas = Vec::new();
        let mut total = 0usize;
        let mut iterations = 0usize;
        let mut converged = false;

        let mut previous = store.count()?;
        let mut snapshot = if self.debug_diff {
            Some(triple_strings(store)?)
        } else {
            None
        };

        while iterations < self.iteration_limit {
            iterations += 1;

            for rule in rules {
                match self.apply_construct(store, &rule.sparql) {
                    Ok(outcome) => debug!(
                        rule = %rule.name,
                        iteration = iterations,
                        new_triples = outcome.new_triples,
                        elapsed_ms = outcome.elapsed.as_millis() as u64,
                        "applied rule"
                    ),
                    Err(e) => self.record_failure(e),
                }
            }

            let current = store.count()?;
            let added = current.saturating_sub(previous);

            if added > 0 {
                if let Some(previous_triples) = snapshot.as_mut() {
                    let current_triples = triple_strings(store)?;
                    report_diff(iterations, previous_triples, &current_triples);
                    *previous_triples = current_triples;
                }
            }

            deltas.push(added);
            total += added;

            if added == 0 {
                converged = true;
                break;
            }
            previous = current;
        }

        Ok(ConvergenceStats {
            iterations,
            new_triples: total,
            converged,
            deltas,
        })
    }

    /// Like [`apply_construct`](Self::apply_construct) but failures are
    /// recorded instead of returned.
    pub fn try_construct(&mut self, store: &GraphStore, sparql: &str) -> Option<ApplyOutcome> {
        match self.apply_construct(store, sparql) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.record_failure(e);
                None
            }
        }
    }

    /// Like [`apply_update`](Self::apply_update) but failures are recorded
    /// instead of returned.
    pub fn try_update(&mut self, store: &GraphStore, sparql: &str) -> Option<ApplyOutcome> {
        match self.apply_update(store, sparql) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.record_failure(e);
                None
            }
        }
    }

    fn record_failure(&mut self, error: StoreError) {
        warn!(%error, "query execution failed; continuing");
        self.failures.push(error);
    }

    /// Failures recorded since construction (or the last take).
    pub fn failures(&self) -> &[StoreError] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<StoreError> {
        std::mem::take(&mut self.failures)
    }
}

/// Canonical string form of every triple, for diff tracing.
fn triple_strings(store: &GraphStore) -> StoreResult<BTreeSet<String>> {
    Ok(store
        .quads()?
        .iter()
        .map(|q| format!("{} {} {}", q.subject, q.predicate, q.object))
        .collect())
}

fn report_diff(iteration: usize, before: &BTreeSet<String>, after: &BTreeSet<String>) {
    let added: Vec<&String> = after.difference(before).collect();
    info!(iteration, total = added.len(), "new triples this iteration");
    for triple in added.iter().take(DIFF_SAMPLE_LIMIT) {
        info!("  + {triple}");
    }
    if added.len() > DIFF_SAMPLE_LIMIT {
        info!("  ... and {} more", added.len() - DIFF_SAMPLE_LIMIT);
    }
}
