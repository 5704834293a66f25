//! The index store: buffered writer plus committed point-in-time state.
//!
//! The writer side buffers adds and delete-filters; `commit` applies them
//! in arrival order to the committed state and, for on-disk stores,
//! persists a new segment. The searcher side only ever observes committed
//! state, and an already-open searcher is never refreshed behind the
//! caller's back: after a commit the caller invalidates and re-requests.

use crate::index::schema::{DocCategory, Document, Field, FilterSet};
use crate::index::searcher::{IndexQuery, IndexState, QueryError, Searcher};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// On-disk format version; bump when the segment layout changes.
const FORMAT_VERSION: u32 = 1;

const LOCK_FILE: &str = "oxi.lock";
const META_FILE: &str = "meta.json";
const SEGMENT_FILE: &str = "segment.json";

/// Where the index lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexLocation {
    /// Ephemeral, lost on dispose.
    Memory,
    /// Persistent directory; locked for the store's lifetime.
    Disk(PathBuf),
}

/// Failures opening, writing, or reading the index.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("index i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index directory is locked: {0}")]
    Locked(PathBuf),
    #[error("index is corrupt: {0}")]
    Corrupt(String),
    #[error("store has been disposed")]
    Disposed,
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Index metadata stored in meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMeta {
    version: u32,
    doc_count: u64,
    created_at: u64,
    updated_at: u64,
}

#[derive(Debug)]
enum PendingOp {
    Add(Document),
    Delete(FilterSet),
}

/// Live document counts by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub declarations: u64,
    pub annotations: u64,
    pub restrictions: u64,
    pub logical: u64,
}

/// Owns the physical inverted index: writer buffer, committed state, and
/// the cached searcher.
pub struct IndexStore {
    location: IndexLocation,
    state: IndexState,
    pending: Vec<PendingOp>,
    cached: Option<Searcher>,
    lock_path: Option<PathBuf>,
    disposed: bool,
}

impl IndexStore {
    /// Open a store. Fails fast when the location is invalid or already
    /// locked by another store.
    pub fn open(location: IndexLocation) -> Result<Self, StoreError> {
        let (state, lock_path) = match &location {
            IndexLocation::Memory => (IndexState::default(), None),
            IndexLocation::Disk(dir) => {
                fs::create_dir_all(dir)?;
                let lock_path = dir.join(LOCK_FILE);
                match fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&lock_path)
                {
                    Ok(mut file) => {
                        let _ = write!(file, "{}", std::process::id());
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        return Err(StoreError::Locked(dir.clone()));
                    }
                    Err(e) => return Err(e.into()),
                }
                let state = match load_segment(dir) {
                    Ok(state) => state,
                    Err(e) => {
                        // Release the lock we just took before failing
                        let _ = fs::remove_file(&lock_path);
                        return Err(e);
                    }
                };
                (state, Some(lock_path))
            }
        };

        debug!(docs = state.live_count(), ?location, "index store opened");

        Ok(Self {
            location,
            state,
            pending: Vec::new(),
            cached: None,
            lock_path,
            disposed: false,
        })
    }

    /// Buffer documents for addition. Nothing is visible until `commit`.
    pub fn add_all(&mut self, docs: impl IntoIterator<Item = Document>) -> Result<(), StoreError> {
        self.check_open()?;
        self.pending.extend(docs.into_iter().map(PendingOp::Add));
        Ok(())
    }

    /// Buffer delete-filters. A document is deleted at commit time iff all
    /// (field, value) pairs of some filter match it exactly.
    pub fn remove_by_filters(
        &mut self,
        filters: impl IntoIterator<Item = FilterSet>,
    ) -> Result<(), StoreError> {
        self.check_open()?;
        self.pending
            .extend(filters.into_iter().map(PendingOp::Delete));
        Ok(())
    }

    /// Apply all buffered operations in arrival order and persist.
    ///
    /// The cached searcher is untouched: a newly requested searcher after
    /// `invalidate_searcher` observes exactly the committed state.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.check_open()?;

        for op in self.pending.drain(..) {
            match op {
                PendingOp::Add(doc) => {
                    self.state.insert(doc);
                }
                PendingOp::Delete(filter) => {
                    self.state.delete_matching(&filter);
                }
            }
        }

        if let IndexLocation::Disk(dir) = &self.location {
            persist_segment(dir, &self.state)?;
        }

        Ok(())
    }

    /// The cached point-in-time searcher, constructed lazily from the last
    /// committed state.
    pub fn current_searcher(&mut self) -> Result<Searcher, StoreError> {
        self.check_open()?;
        if self.cached.is_none() {
            self.cached = Some(Searcher::new(Arc::new(self.state.clone())));
        }
        Ok(self.cached.clone().expect("searcher just cached"))
    }

    /// Drop the cached searcher so the next request sees the latest commit.
    pub fn invalidate_searcher(&mut self) {
        self.cached = None;
    }

    /// Evaluate a query against the current searcher.
    pub fn search(&mut self, query: &IndexQuery) -> Result<Vec<u32>, StoreError> {
        let searcher = self.current_searcher()?;
        Ok(searcher.search(query)?)
    }

    /// Flush buffered operations and release the writer. Idempotent.
    pub fn dispose(&mut self) -> Result<(), StoreError> {
        if self.disposed {
            return Ok(());
        }
        self.commit()?;
        self.disposed = true;
        self.cached = None;
        if let Some(lock_path) = self.lock_path.take() {
            let _ = fs::remove_file(lock_path);
        }
        Ok(())
    }

    /// Drop everything committed and buffered. Used by full rebuilds.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.check_open()?;
        self.state = IndexState::default();
        self.pending.clear();
        Ok(())
    }

    /// Committed live document count.
    pub fn doc_count(&self) -> u64 {
        self.state.live_count()
    }

    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.state.live_count(),
            ..Default::default()
        };
        for doc in self.state.live_docs() {
            match doc.category() {
                Some(DocCategory::Declaration) => stats.declarations += 1,
                Some(DocCategory::Annotation) => stats.annotations += 1,
                Some(DocCategory::Restriction) => stats.restrictions += 1,
                Some(DocCategory::Logical) => stats.logical += 1,
                None => {}
            }
        }
        stats
    }

    /// Distinct subject IRIs across committed live documents.
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .state
            .live_docs()
            .filter_map(|doc| doc.get(Field::EntityIri).map(str::to_string))
            .collect();
        subjects.sort();
        subjects.dedup();
        subjects
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.disposed {
            Err(StoreError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for IndexStore {
    fn drop(&mut self) {
        if let Some(lock_path) = self.lock_path.take() {
            let _ = fs::remove_file(lock_path);
        }
    }
}

fn load_segment(dir: &Path) -> Result<IndexState, StoreError> {
    let meta_path = dir.join(META_FILE);
    let segment_path = dir.join(SEGMENT_FILE);

    if !meta_path.exists() {
        return Ok(IndexState::default());
    }

    let meta: IndexMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)
        .map_err(|e| StoreError::Corrupt(format!("bad meta.json: {e}")))?;
    if meta.version != FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported index format version {}",
            meta.version
        )));
    }

    let docs: Vec<Document> = serde_json::from_str(&fs::read_to_string(&segment_path)?)
        .map_err(|e| StoreError::Corrupt(format!("bad segment: {e}")))?;

    // Postings are rebuilt from the stored documents at open time
    let mut state = IndexState::default();
    for doc in docs {
        state.insert(doc);
    }

    if state.live_count() != meta.doc_count {
        return Err(StoreError::Corrupt(format!(
            "meta says {} docs, segment holds {}",
            meta.doc_count,
            state.live_count()
        )));
    }

    Ok(state)
}

fn persist_segment(dir: &Path, state: &IndexState) -> Result<(), StoreError> {
    let docs: Vec<&Document> = state.live_docs().collect();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let created_at = fs::read_to_string(dir.join(META_FILE))
        .ok()
        .and_then(|data| serde_json::from_str::<IndexMeta>(&data).ok())
        .map(|meta| meta.created_at)
        .unwrap_or(now);

    let meta = IndexMeta {
        version: FORMAT_VERSION,
        doc_count: docs.len() as u64,
        created_at,
        updated_at: now,
    };

    // Write-then-rename so a crash mid-commit never leaves a torn segment
    let tmp_segment = dir.join(format!("{SEGMENT_FILE}.tmp"));
    let mut file = File::create(&tmp_segment)?;
    serde_json::to_writer(&mut file, &docs)
        .map_err(|e| StoreError::Corrupt(format!("segment encode failed: {e}")))?;
    file.flush()?;
    fs::rename(&tmp_segment, dir.join(SEGMENT_FILE))?;

    let tmp_meta = dir.join(format!("{META_FILE}.tmp"));
    let meta_file = File::create(&tmp_meta)?;
    serde_json::to_writer_pretty(meta_file, &meta)
        .map_err(|e| StoreError::Corrupt(format!("meta encode failed: {e}")))?;
    fs::rename(&tmp_meta, dir.join(META_FILE))?;

    Ok(())
}
