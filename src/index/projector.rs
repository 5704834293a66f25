//! Change projector: turns a batch of graph edits into the documents to
//! add and the filter-sets to delete.
//!
//! `compute_add` and `compute_remove` are independent of each other; the
//! engine always applies remove-then-add, so an update modeled as
//! remove+add of the same subject never duplicates a document. That
//! ordering is a hard invariant, not an optimization.

use crate::index::schema::{filters_for_axiom, project_axiom, project_entity, Document, FilterSet};
use crate::ontology::{AxiomChange, OntologySource};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::debug;

/// Projects edit batches and full snapshots into index deltas.
pub struct ChangeProjector<'a> {
    source: &'a dyn OntologySource,
}

impl<'a> ChangeProjector<'a> {
    pub fn new(source: &'a dyn OntologySource) -> Self {
        Self { source }
    }

    /// Documents to add for this batch: one visit per `Add` edit. A no-op
    /// batch (nothing resolvable, nothing added) produces no documents.
    pub fn compute_add(&self, edits: &[AxiomChange]) -> Vec<Document> {
        let mut seen = FxHashSet::default();
        let mut docs = Vec::new();

        for edit in edits {
            if let AxiomChange::Add(axiom) = edit {
                for doc in project_axiom(axiom, self.source) {
                    if seen.insert(doc.clone()) {
                        docs.push(doc);
                    }
                }
            }
        }

        debug!(edits = edits.len(), docs = docs.len(), "computed additions");
        docs
    }

    /// Filter-sets identifying documents to delete: one visit per `Remove`
    /// edit, mirroring the fields `compute_add` would have produced.
    pub fn compute_remove(&self, edits: &[AxiomChange]) -> Vec<FilterSet> {
        let mut seen = FxHashSet::default();
        let mut filters = Vec::new();

        for edit in edits {
            if let AxiomChange::Remove(axiom) = edit {
                for filter in filters_for_axiom(axiom, self.source) {
                    if seen.insert(filter.clone()) {
                        filters.push(filter);
                    }
                }
            }
        }

        debug!(edits = edits.len(), filters = filters.len(), "computed removals");
        filters
    }

    /// Project the full current snapshot: every declared entity plus every
    /// axiom. Projection is pure, so it parallelizes; index mutation stays
    /// on the caller's single worker.
    pub fn project_full(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .source
            .entities()
            .par_iter()
            .map(project_entity)
            .collect();

        let axiom_docs: Vec<Document> = self
            .source
            .axioms()
            .par_iter()
            .flat_map_iter(|axiom| project_axiom(axiom, self.source))
            .collect();

        docs.extend(axiom_docs);

        let mut seen = FxHashSet::default();
        docs.retain(|doc| seen.insert(doc.clone()));
        docs
    }
}
