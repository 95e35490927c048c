//! # Inference Orchestrator
//!
//! Drives the outer fixed point: loads every framework's data and the user
//! data, skolemizes blank nodes once, then rounds of rule application
//! until a full round derives nothing new (or `max_rounds` is exhausted,
//! which is a status, not an error).
//!
//! Within a round the ordering is semantically significant: per framework
//! in execution order, rules files run to inner convergence, then ad-hoc
//! CONSTRUCTs, then UPDATEs; after all frameworks come the user-registered
//! queries and updates, in registration order. UPDATEs may delete triples
//! that the next round's CONSTRUCTs rederive.

use oxigraph::io::RdfFormat;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::compiler::RuleCompiler;
use crate::config::Config;
use crate::engine::RuleEngine;
use crate::error::{InferenceError, InferenceResult};
use crate::framework::{
    display_relative, CompiledContent, FileKind, Framework, LoadError, LoadResult, TrustTier,
};
use crate::skolem::Skolemizer;
use crate::stats::{OperationKind, StatsTracker};
use crate::store::{GraphStore, SolutionRow, StoreResult};

/// An ad-hoc query registered by the caller.
#[derive(Debug, Clone)]
pub struct NamedQuery {
    pub name: String,
    pub text: String,
}

/// Outcome of an inference run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Rounds executed (equals `max_rounds` when not converged)
    pub rounds: usize,
    pub converged: bool,
    /// Triple count right after loading and skolemization
    pub initial_triples: usize,
    pub final_triples: usize,
}

/// The inference system: frameworks, user inputs, store, and the outer
/// fixed-point driver.
pub struct InferenceSystem {
    compiler: RuleCompiler,
    engine: RuleEngine,
    skolemizer: Skolemizer,
    store: GraphStore,
    frameworks: Vec<Framework>,
    data_files: Vec<PathBuf>,
    constructs: Vec<NamedQuery>,
    updates: Vec<NamedQuery>,
    stats: StatsTracker,
    max_rounds: usize,
    working_dir: PathBuf,
}

impl InferenceSystem {
    /// Create an empty system. `working_dir` anchors display paths; no
    /// global process state is consulted.
    pub fn new(config: &Config, working_dir: PathBuf) -> InferenceResult<Self> {
        Ok(InferenceSystem {
            compiler: RuleCompiler::new().lenient(config.engine.lenient_builtins),
            engine: RuleEngine::new(config.engine.iteration_limit, config.engine.debug_diff),
            skolemizer: Skolemizer::default(),
            store: GraphStore::new()?,
            frameworks: Vec::new(),
            data_files: Vec::new(),
            constructs: Vec::new(),
            updates: Vec::new(),
            stats: StatsTracker::new(),
            max_rounds: config.engine.max_rounds,
            working_dir,
        })
    }

    /// The rule compiler, for registering extra prefixes before loading.
    pub fn compiler_mut(&mut self) -> &mut RuleCompiler {
        &mut self.compiler
    }

    /// Load the required system frameworks from a metamodel directory.
    ///
    /// Every subdirectory becomes a framework; ones that claim neither
    /// Internal nor Core tier are coerced (the `inference` framework to
    /// Internal, everything else to Core).
    pub fn load_system_frameworks(&mut self, metamodel_dir: &Path) -> LoadResult<()> {
        if !metamodel_dir.is_dir() {
            return Err(LoadError::MetamodelMissing {
                path: metamodel_dir.to_path_buf(),
            });
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(metamodel_dir)
            .map_err(|source| LoadError::Io {
                path: metamodel_dir.to_path_buf(),
                source,
            })?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let mut framework = Framework::load(&dir, &self.compiler, &self.working_dir)?;
            if framework.tier.loadable_externally() {
                framework.tier = if framework.name == "inference" {
                    TrustTier::Internal
                } else {
                    TrustTier::Core
                };
            }
            info!(
                name = %framework.name,
                tier = %framework.tier,
                version = %framework.version,
                "loaded system framework"
            );
            self.frameworks.push(framework);
        }

        Ok(())
    }

    /// Load an external framework. External frameworks may not claim the
    /// Internal or Core tier, and every declared dependency must already
    /// be loaded.
    pub fn load_framework(&mut self, dir: &Path) -> LoadResult<()> {
        let framework = Framework::load(dir, &self.compiler, &self.working_dir)?;

        if !framework.tier.loadable_externally() {
            return Err(LoadError::IllegalTrustTier {
                name: framework.name,
                tier: framework.tier,
            });
        }
        for dependency in &framework.depends_on {
            if !self.frameworks.iter().any(|f| &f.name == dependency) {
                return Err(LoadError::MissingDependency {
                    name: framework.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        info!(
            name = %framework.name,
            tier = %framework.tier,
            version = %framework.version,
            "loaded framework"
        );
        self.frameworks.push(framework);
        Ok(())
    }

    /// Register a user data file (Turtle), loaded before round 1.
    pub fn add_data_file(&mut self, path: PathBuf) {
        self.data_files.push(path);
    }

    /// Register an ad-hoc CONSTRUCT query, applied once per round after
    /// all frameworks.
    pub fn add_construct(&mut self, text: String, name: Option<String>) {
        let name = name.unwrap_or_else(|| format!("query-{}", self.constructs.len()));
        self.constructs.push(NamedQuery { name, text });
    }

    /// Register an ad-hoc UPDATE, applied once per round after all
    /// CONSTRUCT queries.
    pub fn add_update(&mut self, text: String, name: Option<String>) {
        let name = name.unwrap_or_else(|| format!("update-{}", self.updates.len()));
        self.updates.push(NamedQuery { name, text });
    }

    /// Frameworks in execution order: a stable topological extension of
    /// Internal < Core < Privacy < Custom, preserving load order within
    /// each tier.
    pub fn ordered_frameworks(&self) -> Vec<&Framework> {
        self.execution_order()
            .into_iter()
            .map(|i| &self.frameworks[i])
            .collect()
    }

    fn execution_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.frameworks.len());
        for tier in TrustTier::ALL {
            for (i, framework) in self.frameworks.iter().enumerate() {
                if framework.tier == tier {
                    order.push(i);
                }
            }
        }
        order
    }

    /// Run inference to convergence. Loads all data, skolemizes once, then
    /// iterates rounds until a round adds nothing or `max_rounds` is hit.
    pub fn run(&mut self) -> InferenceResult<RunSummary> {
        info!("starting inference");

        for idx in self.execution_order() {
            let framework = &self.frameworks[idx];
            for file in framework.files_of(FileKind::Data) {
                let base = format!("file://{}", file.path.display());
                self.store
                    .load(&file.content, RdfFormat::Turtle, Some(&base))?;
                debug!(framework = %framework.name, file = %file.name, "loaded data");
            }
        }

        for path in &self.data_files {
            let bytes = fs::read(path).map_err(|source| InferenceError::Io {
                path: path.clone(),
                source,
            })?;
            let base = format!("file://{}", path.display());
            self.store.load(&bytes, RdfFormat::Turtle, Some(&base))?;
            debug!(file = %display_relative(path, &self.working_dir), "loaded user data");
        }

        info!("skolemizing blank nodes");
        self.store = self.skolemizer.skolemize(&self.store)?;

        let initial_triples = self.store.count()?;
        info!(initial_triples, "initial triple count");

        let mut rounds = 0;
        let mut converged = false;
        for round in 1..=self.max_rounds {
            debug!(round, "inference round");
            let delta = self.run_round()?;
            rounds = round;
            if delta == 0 {
                converged = true;
                info!(rounds, "converged");
                break;
            }
        }
        if !converged {
            info!(
                max_rounds = self.max_rounds,
                "reached maximum rounds without converging"
            );
        }

        let final_triples = self.store.count()?;
        info!(final_triples, "final triple count");
        self.log_stats();

        Ok(RunSummary {
            rounds,
            converged,
            initial_triples,
            final_triples,
        })
    }

    /// Run a single inference round over every framework and every
    /// registered query. Returns the round's total triple delta.
    pub fn run_round(&mut self) -> InferenceResult<usize> {
        let mut total = 0usize;

        for idx in self.execution_order() {
            for file in self.frameworks[idx].files_of(FileKind::Rules) {
                let CompiledContent::Rules(rules) = &file.compiled else {
                    continue;
                };
                let started = Instant::now();
                let stats = self.engine.run_to_convergence(&self.store, rules)?;
                let elapsed = started.elapsed();
                total += stats.new_triples;
                self.stats.record(
                    &file.display_path,
                    OperationKind::Rules,
                    stats.new_triples,
                    elapsed,
                );
                debug!(
                    file = %file.display_path,
                    new_triples = stats.new_triples,
                    iterations = stats.iterations,
                    "applied rules file"
                );
            }

            for file in self.frameworks[idx].files_of(FileKind::Construct) {
                let CompiledContent::Query(text) = &file.compiled else {
                    continue;
                };
                if let Some(outcome) = self.engine.try_construct(&self.store, text) {
                    total += outcome.new_triples;
                    self.stats.record(
                        &file.display_path,
                        OperationKind::Construct,
                        outcome.new_triples,
                        outcome.elapsed,
                    );
                }
            }

            for file in self.frameworks[idx].files_of(FileKind::Update) {
                let CompiledContent::Query(text) = &file.compiled else {
                    continue;
                };
                if let Some(outcome) = self.engine.try_update(&self.store, text) {
                    self.stats.record(
                        &file.display_path,
                        OperationKind::Update,
                        0,
                        outcome.elapsed,
                    );
                }
            }
        }

        for query in &self.constructs {
            if let Some(outcome) = self.engine.try_construct(&self.store, &query.text) {
                total += outcome.new_triples;
                self.stats.record(
                    &query.name,
                    OperationKind::Construct,
                    outcome.new_triples,
                    outcome.elapsed,
                );
            }
        }

        for query in &self.updates {
            if let Some(outcome) = self.engine.try_update(&self.store, &query.text) {
                self.stats
                    .record(&query.name, OperationKind::Update, 0, outcome.elapsed);
            }
        }

        Ok(total)
    }

    /// Execute a SELECT query on the inferred graph.
    pub fn query(&self, sparql: &str) -> StoreResult<Vec<SolutionRow>> {
        self.store.select(sparql)
    }

    /// Export the materialized graph to `path` as N-Quads.
    pub fn export(&self, path: &Path) -> InferenceResult<()> {
        let dump = self.store.dump_nquads()?;
        fs::write(path, dump).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "exported graph");
        Ok(())
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Replace the store wholesale, e.g. with one restored from the result
    /// cache. Ownership of the handle moves into the system.
    pub fn adopt_store(&mut self, store: GraphStore) -> InferenceResult<()> {
        let count = store.count()?;
        info!(triples = count, "adopted pre-computed store");
        self.store = store;
        Ok(())
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// Content hash of every input, used as the result-cache key.
    pub fn cache_key(&self) -> Result<String, crate::cache::CacheError> {
        crate::cache::compute_key(
            &self.ordered_frameworks(),
            &self.data_files,
            &self.constructs,
            &self.updates,
        )
    }

    /// The execution engine, exposing recorded query failures.
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn frameworks(&self) -> &[Framework] {
        &self.frameworks
    }

    pub fn data_files(&self) -> &[PathBuf] {
        &self.data_files
    }

    pub fn constructs(&self) -> &[NamedQuery] {
        &self.constructs
    }

    pub fn updates(&self) -> &[NamedQuery] {
        &self.updates
    }

    fn log_stats(&self) {
        if self.stats.is_empty() {
            return;
        }
        for record in self.stats.sorted() {
            let avg = record.elapsed.as_secs_f64() / record.invocations.max(1) as f64;
            info!(
                name = %record.name,
                kind = %record.kind,
                calls = record.invocations,
                total_sec = record.elapsed.as_secs_f64(),
                avg_sec = avg,
                new_triples = record.new_triples,
                "operation timing"
            );
        }
        let (total_time, total_triples) = self.stats.summary();
        info!(
            total_sec = total_time.as_secs_f64(),
            total_triples, "inference totals"
        );
    }
}
