//! # Inferox
//!
//! A forward-chaining inference engine for RDF knowledge graphs, driven by
//! rule packages called *frameworks*. Frameworks bundle ontology data,
//! declarative inference rules, ad-hoc derivation queries, and in-place
//! rewrites; the engine loads them with user instance data and derives new
//! triples until a fixed point is reached. The resulting graph is
//! queryable with SPARQL.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Framework directories + user data
//!     ↓
//! [Framework Loader]    → trust tiers, dependency checks, execution order
//!     ↓
//! [Rule Compiler]       → one SPARQL CONSTRUCT query per rule
//!     ↓
//! [Skolemizer]          → blank nodes become stable urn:skolem: IRIs
//!     ↓
//! [Execution Engine]    → per-rules-file inner fixed point, deltas, timing
//!     ↓
//! [Orchestrator]        → outer fixed point across all frameworks
//!     ↓
//! [Result Cache]        → materialized graph keyed by input hash
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use inferox::{Config, InferenceSystem};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut system = InferenceSystem::new(&config, std::env::current_dir()?)?;
//!
//! system.load_framework(Path::new("frameworks/base"))?;
//! system.add_data_file("data/records.ttl".into());
//!
//! let summary = system.run()?;
//! println!("converged: {} after {} rounds", summary.converged, summary.rounds);
//!
//! for row in system.query("SELECT ?s WHERE { ?s a <https://example.org/ns#C> }")? {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `compiler` | Rule syntax → SPARQL CONSTRUCT queries |
//! | `skolem` | Deterministic blank-node elimination |
//! | `store` | Facade over the Oxigraph quad store |
//! | `engine` | Query application, deltas, inner fixed point |
//! | `inference` | Outer fixed point across frameworks |
//! | `framework` | Manifests, trust tiers, execution order |
//! | `cache` | Content-addressed result persistence |
//! | `config` | Hierarchical configuration (figment) |
//! | `stats` | Per-operation execution statistics |

pub mod cache;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod framework;
pub mod inference;
pub mod skolem;
pub mod stats;
pub mod store;

// Re-export the public API surface
pub use cache::{compute_key, CacheError, ResultCache};
pub use compiler::{is_known_builtin, CompileError, CompiledRule, RuleCompiler};
pub use config::Config;
pub use engine::{ApplyOutcome, ConvergenceStats, RuleEngine};
pub use error::{InferenceError, InferenceResult};
pub use framework::{BundledFile, CompiledContent, FileKind, Framework, LoadError, TrustTier};
pub use inference::{InferenceSystem, NamedQuery, RunSummary};
pub use skolem::{SkolemMode, Skolemizer};
pub use stats::{ExecutionStats, OperationKind, StatsTracker};
pub use store::{term_kind, term_value, GraphStore, QueryOutcome, SolutionRow, StoreError};

// Re-export the model types that appear in the facade's signatures
pub use oxigraph::io::RdfFormat;
pub use oxigraph::model::{BlankNode, GraphName, Literal, NamedNode, Quad, Term, Triple};
