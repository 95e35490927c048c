//! # Blank Node Skolemizer
//!
//! Preprocessing pass that replaces every blank node with a stable IRI
//! under the `urn:skolem:` namespace, so rules can reference former blank
//! nodes by identity across inference rounds. Runs exactly once, after all
//! initial loads and before the first rule application.
//!
//! Two modes:
//!
//! - **Content-based** (default): a blank node's IRI is derived from the
//!   multiset of its incident edges, so structurally indistinguishable
//!   nodes map to the *same* IRI and merge. The merge is intended.
//! - **Identifier-hash**: the IRI is derived from the node's lexical id.
//!   Only sound when blank-node identifiers are stable across runs.

use oxigraph::model::{NamedNode, Quad, Subject, Term};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::store::{GraphStore, StoreResult};

/// Skolem IRI derivation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkolemMode {
    /// Hash each blank node's lexical identifier.
    IdentifierHash,
    /// Hash each blank node's incident-edge signature.
    #[default]
    ContentBased,
}

/// Deterministic blank-node eliminator.
pub struct Skolemizer {
    namespace: String,
    mode: SkolemMode,
}

impl Default for Skolemizer {
    fn default() -> Self {
        Self::new(SkolemMode::ContentBased)
    }
}

impl Skolemizer {
    pub fn new(mode: SkolemMode) -> Self {
        Skolemizer {
            namespace: "urn:skolem:".to_string(),
            mode,
        }
    }

    /// Produce a new store in which no quad contains a blank-node term.
    ///
    /// Subject and object positions are rewritten; predicates and graph
    /// names are IRIs already and pass through. The caller replaces its
    /// store handle with the returned one.
    pub fn skolemize(&self, store: &GraphStore) -> StoreResult<GraphStore> {
        let quads = store.quads()?;

        let mut mapping = match self.mode {
            SkolemMode::ContentBased => self.content_based_ids(&quads),
            SkolemMode::IdentifierHash => self.identifier_ids(&quads),
        };

        let output = GraphStore::new()?;
        for quad in &quads {
            let subject = match &quad.subject {
                Subject::BlankNode(b) => {
                    Subject::NamedNode(self.resolve(&mut mapping, &b.to_string()))
                }
                other => other.clone(),
            };
            let object = match &quad.object {
                Term::BlankNode(b) => {
                    Term::NamedNode(self.resolve(&mut mapping, &b.to_string()))
                }
                other => other.clone(),
            };
            output.add(&Quad::new(
                subject,
                quad.predicate.clone(),
                object,
                quad.graph_name.clone(),
            ))?;
        }

        Ok(output)
    }

    /// Signature of each blank node: `(p, o)` for every edge it is subject
    /// of, `(^p, s)` for every edge it is object of. Sorted and joined,
    /// the signature hashes to the node's stable id.
    fn content_based_ids(&self, quads: &[Quad]) -> HashMap<String, String> {
        let mut signatures: HashMap<String, Vec<(String, String)>> = HashMap::new();

        for quad in quads {
            if let Subject::BlankNode(b) = &quad.subject {
                signatures
                    .entry(b.to_string())
                    .or_default()
                    .push((quad.predicate.to_string(), quad.object.to_string()));
            }
            if let Term::BlankNode(b) = &quad.object {
                signatures
                    .entry(b.to_string())
                    .or_default()
                    .push((format!("^{}", quad.predicate), quad.subject.to_string()));
            }
        }

        signatures
            .into_iter()
            .map(|(blank_id, mut signature)| {
                signature.sort();
                let joined = signature
                    .iter()
                    .map(|(p, o)| format!("{p}={o}"))
                    .collect::<Vec<_>>()
                    .join(";");
                let iri = format!("{}content-{}", self.namespace, short_hash(&joined));
                (blank_id, iri)
            })
            .collect()
    }

    fn identifier_ids(&self, quads: &[Quad]) -> HashMap<String, String> {
        let mut mapping = HashMap::new();
        for quad in quads {
            if let Subject::BlankNode(b) = &quad.subject {
                self.register(&mut mapping, &b.to_string());
            }
            if let Term::BlankNode(b) = &quad.object {
                self.register(&mut mapping, &b.to_string());
            }
        }
        mapping
    }

    fn register(&self, mapping: &mut HashMap<String, String>, blank_id: &str) {
        if !mapping.contains_key(blank_id) {
            let iri = format!("{}{}", self.namespace, short_hash(blank_id));
            mapping.insert(blank_id.to_string(), iri);
        }
    }

    /// Look up a blank node's skolem IRI, registering stragglers by
    /// identifier hash.
    fn resolve(&self, mapping: &mut HashMap<String, String>, blank_id: &str) -> NamedNode {
        self.register(mapping, blank_id);
        let iri = mapping
            .get(blank_id)
            .cloned()
            .unwrap_or_else(|| format!("{}{}", self.namespace, short_hash(blank_id)));
        NamedNode::new_unchecked(iri)
    }
}

/// First 16 hex chars of the SHA-256 of `input`.
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}
