//! # Store Facade
//!
//! Thin abstraction over the Oxigraph quad store. This is the only module
//! that talks to the SPARQL engine; everything above it works in terms of
//! [`GraphStore`] and the tagged model types ([`Quad`], [`Term`]) it exposes.
//! Swapping engines means reimplementing this file.

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{GraphName, Quad, Term, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use std::path::Path;
use thiserror::Error;

use crate::error::snippet;

/// Store facade errors. `Query` and `Update` carry the offending query text
/// so failures stay attributable when the engine records them and moves on.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Backend(#[from] oxigraph::store::StorageError),

    #[error("failed to parse RDF data: {0}")]
    Load(#[from] oxigraph::store::LoaderError),

    #[error("failed to serialize store: {0}")]
    Dump(#[from] oxigraph::store::SerializerError),

    #[error("invalid base IRI '{base}': {message}")]
    BaseIri { base: String, message: String },

    #[error("query failed: {message} (query: {query})")]
    Query { message: String, query: String },

    #[error("update failed: {message} (update: {update})")]
    Update { message: String, update: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One SELECT solution: variable name paired with its bound term,
/// in the engine's projection order.
pub type SolutionRow = Vec<(String, Term)>;

/// Result of [`GraphStore::query`], one variant per SPARQL query form.
#[derive(Debug)]
pub enum QueryOutcome {
    /// SELECT bindings
    Solutions(Vec<SolutionRow>),
    /// CONSTRUCT triples
    Triples(Vec<Triple>),
    /// ASK verdict
    Boolean(bool),
}

/// Owned handle on a quad store.
///
/// Created empty, populated by [`load`](GraphStore::load), mutated through
/// [`add`](GraphStore::add) and [`update`](GraphStore::update). The
/// skolemizer and the result cache replace the whole handle rather than
/// mutating through it.
pub struct GraphStore {
    store: Store,
}

impl GraphStore {
    /// Create an empty in-memory store.
    pub fn new() -> StoreResult<Self> {
        Ok(GraphStore {
            store: Store::new()?,
        })
    }

    /// Open (or create) an on-disk store rooted at `path`.
    ///
    /// Used by the result cache for its persistent entries.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(GraphStore {
            store: Store::open(path)?,
        })
    }

    /// Parse serialized RDF into the store.
    ///
    /// Relative IRIs in the data resolve against `base_iri` when one is
    /// given; callers loading from disk pass `file://<path>`.
    pub fn load(&self, data: &[u8], format: RdfFormat, base_iri: Option<&str>) -> StoreResult<()> {
        let mut parser = RdfParser::from_format(format);
        if let Some(base) = base_iri {
            parser = parser
                .with_base_iri(base)
                .map_err(|e| StoreError::BaseIri {
                    base: base.to_string(),
                    message: e.to_string(),
                })?;
        }
        self.store.load_from_reader(parser, data)?;
        Ok(())
    }

    /// Insert a quad. Returns `false` when the quad was already present.
    pub fn add(&self, quad: &Quad) -> StoreResult<bool> {
        Ok(self.store.insert(quad)?)
    }

    /// Insert a triple into the default graph.
    pub fn add_triple(&self, triple: Triple) -> StoreResult<bool> {
        self.add(&triple.in_graph(GraphName::DefaultGraph))
    }

    /// Number of quads in the store.
    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.store.len()?)
    }

    /// Materialize every quad in the store.
    pub fn quads(&self) -> StoreResult<Vec<Quad>> {
        self.store
            .iter()
            .map(|q| q.map_err(StoreError::Backend))
            .collect()
    }

    /// Execute a SELECT/CONSTRUCT/ASK query.
    pub fn query(&self, sparql: &str) -> StoreResult<QueryOutcome> {
        let results = self.store.query(sparql).map_err(|e| StoreError::Query {
            message: e.to_string(),
            query: snippet(sparql),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| StoreError::Query {
                        message: e.to_string(),
                        query: snippet(sparql),
                    })?;
                    let row = solution
                        .iter()
                        .map(|(var, term)| (var.as_str().to_string(), term.clone()))
                        .collect();
                    rows.push(row);
                }
                Ok(QueryOutcome::Solutions(rows))
            }
            QueryResults::Graph(triples) => {
                let mut out = Vec::new();
                for triple in triples {
                    out.push(triple.map_err(|e| StoreError::Query {
                        message: e.to_string(),
                        query: snippet(sparql),
                    })?);
                }
                Ok(QueryOutcome::Triples(out))
            }
            QueryResults::Boolean(b) => Ok(QueryOutcome::Boolean(b)),
        }
    }

    /// Execute a CONSTRUCT query, returning the produced triples.
    pub fn construct(&self, sparql: &str) -> StoreResult<Vec<Triple>> {
        match self.query(sparql)? {
            QueryOutcome::Triples(triples) => Ok(triples),
            _ => Err(StoreError::Query {
                message: "query did not produce triples".to_string(),
                query: snippet(sparql),
            }),
        }
    }

    /// Execute a SELECT query, returning the solution rows.
    pub fn select(&self, sparql: &str) -> StoreResult<Vec<SolutionRow>> {
        match self.query(sparql)? {
            QueryOutcome::Solutions(rows) => Ok(rows),
            _ => Err(StoreError::Query {
                message: "query did not produce bindings".to_string(),
                query: snippet(sparql),
            }),
        }
    }

    /// Execute a SPARQL UPDATE (DELETE/INSERT and the DATA forms).
    pub fn update(&self, sparql: &str) -> StoreResult<()> {
        self.store.update(sparql).map_err(|e| StoreError::Update {
            message: e.to_string(),
            update: snippet(sparql),
        })
    }

    /// Dump the full quad set as N-Quads.
    pub fn dump_nquads(&self) -> StoreResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.store
            .dump_to_writer(RdfFormat::NQuads, &mut buffer)?;
        Ok(buffer)
    }

    /// Load an N-Quads dump produced by [`dump_nquads`](Self::dump_nquads).
    pub fn load_nquads(&self, data: &[u8]) -> StoreResult<()> {
        self.load(data, RdfFormat::NQuads, None)
    }

    /// Flush pending writes (meaningful for on-disk stores only).
    pub fn flush(&self) -> StoreResult<()> {
        Ok(self.store.flush()?)
    }
}

/// The lexical value of a term: IRI text, literal value, or blank node id.
pub fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_string(),
        Term::Literal(l) => l.value().to_string(),
        Term::BlankNode(b) => b.as_str().to_string(),
        _ => term.to_string(),
    }
}

/// Coarse term classification for result rendering.
pub fn term_kind(term: &Term) -> &'static str {
    match term {
        Term::NamedNode(_) => "uri",
        Term::Literal(_) => "literal",
        Term::BlankNode(_) => "bnode",
        _ => "triple",
    }
}
