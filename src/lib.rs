//! # OXI - Incremental Ontology Text Search
//!
//! OXI keeps a flat text index synchronized with a live entity/axiom
//! graph and answers keyword queries over it without re-reading the
//! graph. Edits arrive as typed add/remove batches and are folded into
//! the index incrementally; a full rebuild is only needed on first open.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`ontology`] - The graph model: entities, axioms, edit batches
//! - [`index`] - Document schema, change projector, and the index store
//! - [`query`] - Keyword grammar, query compiler, and result algebra
//! - [`engine`] - Query execution and index maintenance
//! - [`scheduler`] - Single-worker scheduler with a supersession fence
//! - [`output`] - Terminal result formatting
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxi::engine::{EngineConfig, SearchEngine};
//! use oxi::ontology::MemoryOntology;
//! use oxi::progress::NullProgress;
//! use oxi::scheduler::Checkpoint;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let ontology = MemoryOntology::load(Path::new("animals.json")).unwrap();
//! let mut engine =
//!     SearchEngine::open(Arc::new(ontology), EngineConfig::default()).unwrap();
//! engine.rebuild(&Checkpoint::unfenced(), &mut NullProgress).unwrap();
//!
//! for hit in engine.search("label:koala").unwrap() {
//!     println!("{}  {}", hit.display_name, hit.iri);
//! }
//! ```
//!
//! Interactive callers submit through [`scheduler::SearchScheduler`]
//! instead: every keystroke's search supersedes the previous one at its
//! next checkpoint, so stale results are never delivered.

pub mod engine;
pub mod index;
pub mod ontology;
pub mod output;
pub mod progress;
pub mod query;
pub mod scheduler;
pub mod text;
