//! The search engine: projects the graph into the index store and executes
//! compiled queries.
//!
//! Every mutation follows remove-then-add within one commit, so an update
//! modeled as remove+add of the same object never duplicates a document.
//! Execution checks the task checkpoint between sub-queries; an aborted
//! evaluation returns `None` and the caller drops the task silently.

use crate::index::{
    ChangeProjector, Field, IndexLocation, IndexQuery, IndexStore, StoreError, StoreStats,
};
use crate::ontology::{AxiomChange, EntityKind, Iri, OntologySource};
use crate::progress::ProgressSink;
use crate::query::{CompiledQuery, ResultSet};
use crate::scheduler::Checkpoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Engine configuration, deserializable from a JSON config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for the persistent index. `None` forces in-memory.
    pub index_dir: Option<PathBuf>,
    /// Graphs with fewer objects than this stay in memory even when an
    /// index directory is configured.
    pub memory_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            memory_threshold: 20_000,
        }
    }
}

/// Engine-level failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One entity hit, resolved back from the documents that matched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub iri: Iri,
    pub display_name: String,
    pub kind: Option<EntityKind>,
    /// First annotation or logical-axiom text of the entity, for display.
    pub excerpt: Option<String>,
}

/// Owns the index store and the graph source it mirrors.
///
/// Not internally synchronized; the scheduler confines it to a single
/// worker thread.
pub struct SearchEngine {
    store: IndexStore,
    source: Arc<dyn OntologySource>,
    config: EngineConfig,
}

impl SearchEngine {
    /// Open the engine, choosing disk or memory placement by graph size.
    pub fn open(source: Arc<dyn OntologySource>, config: EngineConfig) -> Result<Self, EngineError> {
        let size = source.entities().len() + source.axioms().len();
        let location = match &config.index_dir {
            Some(dir) if size >= config.memory_threshold => IndexLocation::Disk(dir.clone()),
            _ => IndexLocation::Memory,
        };
        debug!(objects = size, ?location, "opening search engine");

        let store = IndexStore::open(location)?;
        Ok(Self {
            store,
            source,
            config,
        })
    }

    /// Drop the committed index and re-project the full graph.
    ///
    /// Returns `false` when the checkpoint aborted the build; nothing is
    /// committed in that case.
    pub fn rebuild(
        &mut self,
        checkpoint: &Checkpoint,
        progress: &mut dyn ProgressSink,
    ) -> Result<bool, EngineError> {
        self.store.clear()?;
        let docs = ChangeProjector::new(self.source.as_ref()).project_full();
        progress.begin(docs.len() as u64);

        // The build unit is one document: stop is checked and progress
        // reported before/after every document added.
        let mut added = 0u64;
        for doc in docs {
            if checkpoint.is_stopped() {
                progress.finish();
                debug!("rebuild cancelled");
                return Ok(false);
            }
            self.store.add_all([doc])?;
            added += 1;
            progress.advance(added);
        }

        self.store.commit()?;
        self.store.invalidate_searcher();
        progress.finish();
        debug!(docs = added, "rebuild committed");
        Ok(true)
    }

    /// Apply one edit batch to the index.
    ///
    /// The graph source must already reflect the batch; this only maintains
    /// the index mirror. Removals are applied before additions within the
    /// same commit. A no-op batch leaves the document count unchanged.
    pub fn apply_edits(&mut self, edits: &[AxiomChange]) -> Result<(), EngineError> {
        let projector = ChangeProjector::new(self.source.as_ref());
        let filters = projector.compute_remove(edits);
        let docs = projector.compute_add(edits);

        self.store.remove_by_filters(filters)?;
        self.store.add_all(docs)?;
        self.store.commit()?;
        self.store.invalidate_searcher();
        Ok(())
    }

    /// Execute a compiled query. `Ok(None)` means the checkpoint aborted
    /// evaluation; results are deterministic and sorted by display name.
    pub fn execute(
        &mut self,
        query: &CompiledQuery,
        checkpoint: &Checkpoint,
        progress: &mut dyn ProgressSink,
    ) -> Result<Option<Vec<SearchResult>>, EngineError> {
        progress.begin(query.unit_count());
        let mut exec = Execution {
            engine: &mut *self,
            checkpoint,
            progress: &mut *progress,
            completed: 0,
        };

        let Some(set) = exec.eval(query) else {
            progress.finish();
            return Ok(None);
        };
        progress.finish();

        let mut results: Vec<SearchResult> = set
            .into_iter()
            .map(|iri| self.resolve_result(iri))
            .collect();
        results.sort_by(|a, b| {
            (a.display_name.to_lowercase(), &a.iri).cmp(&(b.display_name.to_lowercase(), &b.iri))
        });
        Ok(Some(results))
    }

    /// Parse, compile, and execute a query string without a fence. Used by
    /// the CLI and tests; interactive callers go through the scheduler.
    pub fn search(&mut self, input: &str) -> Result<Vec<SearchResult>, EngineError> {
        let compiled = crate::query::compile(&crate::query::parse_keywords(input));
        let results = self.execute(
            &compiled,
            &Checkpoint::unfenced(),
            &mut crate::progress::NullProgress,
        )?;
        Ok(results.unwrap_or_default())
    }

    /// Move the index to a new location. The old store is disposed before
    /// the new one opens; the new store reloads whatever committed segment
    /// the location already holds (a fresh location starts empty and needs
    /// a rebuild). Must only run in the worker's task stream so no
    /// in-flight query still references the old store.
    pub fn relocate(&mut self, location: IndexLocation) -> Result<(), EngineError> {
        self.store.dispose()?;
        self.store = IndexStore::open(location)?;
        Ok(())
    }

    /// Flush and release the index. Idempotent.
    pub fn dispose(&mut self) -> Result<(), EngineError> {
        Ok(self.store.dispose()?)
    }

    pub fn doc_count(&self) -> u64 {
        self.store.doc_count()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subjects of the documents matching one index query, with failures
    /// logged and mapped to the empty set.
    fn subjects_matching(&mut self, query: &IndexQuery) -> ResultSet {
        let searcher = match self.store.current_searcher() {
            Ok(searcher) => searcher,
            Err(e) => {
                warn!(error = %e, "searcher unavailable, sub-query yields nothing");
                return ResultSet::new();
            }
        };
        match searcher.search(query) {
            Ok(ids) => ids
                .into_iter()
                .filter_map(|id| searcher.doc(id).and_then(|doc| doc.subject()))
                .collect(),
            Err(e) => {
                warn!(error = %e, "sub-query failed, treating as empty");
                ResultSet::new()
            }
        }
    }

    fn resolve_result(&mut self, iri: Iri) -> SearchResult {
        let entity = self.source.lookup(&iri);
        let display_name = entity
            .as_ref()
            .map(|e| e.label.clone())
            .unwrap_or_else(|| iri.short_form().to_string());

        let excerpt = self
            .store
            .current_searcher()
            .ok()
            .and_then(|searcher| {
                let ids = searcher
                    .search(&IndexQuery::Exact {
                        field: Field::EntityIri,
                        value: iri.as_str().to_string(),
                    })
                    .ok()?;
                ids.into_iter().find_map(|id| {
                    let doc = searcher.doc(id)?;
                    doc.get(Field::AnnotationText)
                        .or_else(|| doc.get(Field::LogicalText))
                        .map(str::to_string)
                })
            });

        SearchResult {
            iri,
            display_name,
            kind: entity.map(|e| e.kind),
            excerpt,
        }
    }
}

/// One query evaluation: threads the checkpoint and progress counter
/// through the recursive walk.
struct Execution<'a, 'b> {
    engine: &'a mut SearchEngine,
    checkpoint: &'b Checkpoint,
    progress: &'a mut dyn ProgressSink,
    completed: u64,
}

impl Execution<'_, '_> {
    /// `None` means the checkpoint aborted evaluation.
    fn eval(&mut self, query: &CompiledQuery) -> Option<ResultSet> {
        if self.checkpoint.should_abort() {
            return None;
        }

        match query {
            CompiledQuery::Index(index_query) => {
                let set = self.engine.subjects_matching(index_query);
                self.step();
                Some(set)
            }

            CompiledQuery::Bool {
                must,
                must_not,
                should,
            } => {
                let mut conjunction: Option<ResultSet> = None;
                for sub in must {
                    let set = self.eval(sub)?;
                    conjunction = Some(match conjunction {
                        Some(acc) => acc.intersect(set),
                        None => set,
                    });
                }

                let mut disjunction: Option<ResultSet> = None;
                for sub in should {
                    let set = self.eval(sub)?;
                    disjunction = Some(match disjunction {
                        Some(acc) => acc.union(set),
                        None => set,
                    });
                }

                let mut result = match (conjunction, disjunction) {
                    (Some(musts), Some(shoulds)) => musts.intersect(shoulds),
                    (Some(musts), None) => musts,
                    (None, Some(shoulds)) => shoulds,
                    (None, None) => ResultSet::new(),
                };

                for sub in must_not {
                    let set = self.eval(sub)?;
                    result = result.difference(&set);
                }
                Some(result)
            }

            CompiledQuery::Restriction { property, filler } => {
                let fillers = self.eval(filler)?;
                let mut matched = ResultSet::new();
                for filler_iri in fillers.iter() {
                    if self.checkpoint.should_abort() {
                        return None;
                    }
                    let restriction = IndexQuery::Bool {
                        must: vec![
                            IndexQuery::Exact {
                                field: Field::RestrictionProperty,
                                value: property.as_str().to_string(),
                            },
                            IndexQuery::Exact {
                                field: Field::RestrictionFiller,
                                value: filler_iri.as_str().to_string(),
                            },
                        ],
                        must_not: Vec::new(),
                        should: Vec::new(),
                    };
                    matched = matched.union(self.engine.subjects_matching(&restriction));
                }
                self.step();
                Some(matched)
            }

            CompiledQuery::Complement { inner } => {
                let set = self.eval(inner)?;
                // The negation universe is the full entity signature, not
                // the set of indexed subjects.
                let universe: ResultSet = self.engine.source.signature().into_iter().collect();
                Some(set.complement(universe))
            }
        }
    }

    fn step(&mut self) {
        self.completed += 1;
        self.progress.advance(self.completed);
    }
}
