//! Point-in-time index snapshot and the queries that run against it.
//!
//! The searcher holds an immutable snapshot of the committed index state;
//! a store commit never changes an already-open searcher. Evaluation uses
//! the narrowing-then-verification discipline: posting lists narrow to
//! candidates, stored values verify phrases and exact matches.

use crate::index::schema::{Document, Field, FilterSet};
use crate::text::{contains_phrase, tokenize};
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identifier of a document within one snapshot. Not stable across
/// reloads; never exposed outside the store/searcher pair.
pub type DocId = u32;

/// A single executable query against the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexQuery {
    /// One tokenized term in a field.
    Term { field: Field, term: String },
    /// Whole-word (possibly multi-word) match, verified against the
    /// stored value.
    Phrase {
        field: Field,
        text: String,
        case_sensitive: bool,
    },
    /// Terms starting with a prefix.
    Prefix { field: Field, prefix: String },
    /// Terms ending with a suffix.
    Suffix { field: Field, suffix: String },
    /// Exact match on the full stored value.
    Exact { field: Field, value: String },
    /// Regex over the raw stored value, bypassing tokenization.
    Regex { field: Field, pattern: String },
    /// Boolean combination: intersect `must`, union `should`, subtract
    /// `must_not`.
    Bool {
        must: Vec<IndexQuery>,
        must_not: Vec<IndexQuery>,
        should: Vec<IndexQuery>,
    },
}

/// A single compiled sub-query failed to evaluate.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Mutable inverted-index state. Owned by the store; searchers see an
/// immutable clone of it.
#[derive(Clone, Debug, Default)]
pub(crate) struct IndexState {
    /// All documents ever added this session; tombstoned ones stay in
    /// place so doc ids remain dense and stable until reload.
    docs: Vec<Document>,
    /// Live (non-deleted) documents.
    live: RoaringBitmap,
    /// Tokenized fields: term -> postings. BTreeMap so prefix queries can
    /// range-scan the dictionary.
    terms: FxHashMap<Field, BTreeMap<String, RoaringBitmap>>,
    /// Keyword fields: exact stored value -> postings.
    exact: FxHashMap<Field, FxHashMap<String, RoaringBitmap>>,
}

impl IndexState {
    pub(crate) fn insert(&mut self, doc: Document) -> DocId {
        let doc_id = self.docs.len() as DocId;
        for (field, value) in doc.fields() {
            if field.is_tokenized() {
                let dict = self.terms.entry(field).or_default();
                for token in tokenize(value) {
                    dict.entry(token).or_default().insert(doc_id);
                }
            } else {
                self.exact
                    .entry(field)
                    .or_default()
                    .entry(value.to_string())
                    .or_default()
                    .insert(doc_id);
            }
        }
        self.live.insert(doc_id);
        self.docs.push(doc);
        doc_id
    }

    /// Delete every live document matching the filter. Returns the number
    /// of documents removed.
    pub(crate) fn delete_matching(&mut self, filter: &FilterSet) -> u64 {
        if filter.is_empty() {
            return 0;
        }

        let candidates = self.narrow_filter(filter);
        let mut deleted = 0u64;

        for doc_id in candidates.iter().collect::<Vec<_>>() {
            let matched = self
                .docs
                .get(doc_id as usize)
                .map(|doc| filter.matches(doc))
                .unwrap_or(false);
            if matched {
                self.remove_doc(doc_id);
                deleted += 1;
            }
        }

        deleted
    }

    /// Narrow deletion candidates with the filter's own pairs.
    fn narrow_filter(&self, filter: &FilterSet) -> RoaringBitmap {
        let mut candidates: Option<RoaringBitmap> = None;

        for (field, value) in filter.pairs() {
            let postings = if field.is_tokenized() {
                let tokens = tokenize(value);
                if tokens.is_empty() {
                    // Cannot narrow on this pair (e.g. empty filler)
                    continue;
                }
                let dict = self.terms.get(&field);
                let mut acc: Option<RoaringBitmap> = None;
                for token in tokens {
                    let posting = dict
                        .and_then(|d| d.get(&token))
                        .cloned()
                        .unwrap_or_default();
                    acc = Some(match acc {
                        Some(mut existing) => {
                            existing &= &posting;
                            existing
                        }
                        None => posting,
                    });
                }
                acc.unwrap_or_default()
            } else {
                self.exact
                    .get(&field)
                    .and_then(|m| m.get(value))
                    .cloned()
                    .unwrap_or_default()
            };

            candidates = Some(match candidates {
                Some(mut existing) => {
                    existing &= &postings;
                    existing
                }
                None => postings,
            });
        }

        let mut result = candidates.unwrap_or_else(|| self.live.clone());
        result &= &self.live;
        result
    }

    fn remove_doc(&mut self, doc_id: DocId) {
        self.live.remove(doc_id);
        let Some(doc) = self.docs.get(doc_id as usize) else {
            return;
        };

        for (field, value) in doc.fields() {
            if field.is_tokenized() {
                if let Some(dict) = self.terms.get_mut(&field) {
                    for token in tokenize(value) {
                        if let Some(posting) = dict.get_mut(&token) {
                            posting.remove(doc_id);
                            if posting.is_empty() {
                                dict.remove(&token);
                            }
                        }
                    }
                }
            } else if let Some(dict) = self.exact.get_mut(&field) {
                if let Some(posting) = dict.get_mut(value) {
                    posting.remove(doc_id);
                    if posting.is_empty() {
                        dict.remove(value);
                    }
                }
            }
        }
    }

    pub(crate) fn live_count(&self) -> u64 {
        self.live.len()
    }

    pub(crate) fn live_docs(&self) -> impl Iterator<Item = &Document> {
        self.live
            .iter()
            .filter_map(|id| self.docs.get(id as usize))
    }
}

/// Read-only view of one committed index state.
///
/// Cheap to clone; long-running queries keep their snapshot alive through
/// the inner `Arc` even if the store refreshes its cached searcher.
#[derive(Clone)]
pub struct Searcher {
    state: Arc<IndexState>,
}

impl Searcher {
    pub(crate) fn new(state: Arc<IndexState>) -> Self {
        Self { state }
    }

    /// Number of live documents in this snapshot.
    pub fn doc_count(&self) -> u64 {
        self.state.live_count()
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&Document> {
        self.state
            .live
            .contains(doc_id)
            .then(|| self.state.docs.get(doc_id as usize))
            .flatten()
    }

    /// Evaluate a query, returning live document ids in ascending order.
    pub fn search(&self, query: &IndexQuery) -> Result<Vec<DocId>, QueryError> {
        let hits = self.eval(query)?;
        Ok(hits.iter().collect())
    }

    fn eval(&self, query: &IndexQuery) -> Result<RoaringBitmap, QueryError> {
        let mut hits = match query {
            IndexQuery::Term { field, term } => self.eval_term(*field, term),
            IndexQuery::Phrase {
                field,
                text,
                case_sensitive,
            } => self.eval_phrase(*field, text, *case_sensitive),
            IndexQuery::Prefix { field, prefix } => self.eval_prefix(*field, prefix),
            IndexQuery::Suffix { field, suffix } => self.eval_suffix(*field, suffix),
            IndexQuery::Exact { field, value } => self.eval_exact(*field, value),
            IndexQuery::Regex { field, pattern } => self.eval_regex(*field, pattern)?,
            IndexQuery::Bool {
                must,
                must_not,
                should,
            } => self.eval_bool(must, must_not, should)?,
        };
        hits &= &self.state.live;
        Ok(hits)
    }

    fn eval_term(&self, field: Field, term: &str) -> RoaringBitmap {
        if !field.is_tokenized() {
            return self.eval_exact(field, term);
        }
        self.state
            .terms
            .get(&field)
            .and_then(|dict| dict.get(&term.to_lowercase()))
            .cloned()
            .unwrap_or_default()
    }

    fn eval_phrase(&self, field: Field, text: &str, case_sensitive: bool) -> RoaringBitmap {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return RoaringBitmap::new();
        }

        // Narrow by token conjunction, then verify word order and
        // boundaries against the stored value.
        let mut candidates: Option<RoaringBitmap> = None;
        for token in &tokens {
            let posting = self
                .state
                .terms
                .get(&field)
                .and_then(|dict| dict.get(token))
                .cloned()
                .unwrap_or_default();
            candidates = Some(match candidates {
                Some(mut existing) => {
                    existing &= &posting;
                    existing
                }
                None => posting,
            });
        }

        let mut verified = RoaringBitmap::new();
        for doc_id in candidates.unwrap_or_default() {
            let Some(doc) = self.state.docs.get(doc_id as usize) else {
                continue;
            };
            if doc
                .get(field)
                .map(|value| contains_phrase(value, text, case_sensitive))
                .unwrap_or(false)
            {
                verified.insert(doc_id);
            }
        }
        verified
    }

    fn eval_prefix(&self, field: Field, prefix: &str) -> RoaringBitmap {
        let prefix = prefix.to_lowercase();
        let mut hits = RoaringBitmap::new();
        if prefix.is_empty() {
            return hits;
        }
        if let Some(dict) = self.state.terms.get(&field) {
            for (_, posting) in dict
                .range(prefix.clone()..)
                .take_while(|(term, _)| term.starts_with(&prefix))
            {
                hits |= posting;
            }
        }
        hits
    }

    fn eval_suffix(&self, field: Field, suffix: &str) -> RoaringBitmap {
        let suffix = suffix.to_lowercase();
        let mut hits = RoaringBitmap::new();
        if suffix.is_empty() {
            return hits;
        }
        if let Some(dict) = self.state.terms.get(&field) {
            for (term, posting) in dict.iter() {
                if term.ends_with(&suffix) {
                    hits |= posting;
                }
            }
        }
        hits
    }

    fn eval_exact(&self, field: Field, value: &str) -> RoaringBitmap {
        if !field.is_tokenized() {
            return self
                .state
                .exact
                .get(&field)
                .and_then(|dict| dict.get(value))
                .cloned()
                .unwrap_or_default();
        }

        // Exact match on a tokenized field: narrow by tokens, verify the
        // full stored value.
        let tokens = tokenize(value);
        let mut candidates: Option<RoaringBitmap> = None;
        for token in &tokens {
            let posting = self
                .state
                .terms
                .get(&field)
                .and_then(|dict| dict.get(token))
                .cloned()
                .unwrap_or_default();
            candidates = Some(match candidates {
                Some(mut existing) => {
                    existing &= &posting;
                    existing
                }
                None => posting,
            });
        }

        let mut verified = RoaringBitmap::new();
        for doc_id in candidates.unwrap_or_default() {
            if let Some(doc) = self.state.docs.get(doc_id as usize) {
                if doc.get(field) == Some(value) {
                    verified.insert(doc_id);
                }
            }
        }
        verified
    }

    fn eval_regex(&self, field: Field, pattern: &str) -> Result<RoaringBitmap, QueryError> {
        let regex = regex::Regex::new(pattern)?;
        let mut hits = RoaringBitmap::new();
        for doc_id in self.state.live.iter() {
            let Some(doc) = self.state.docs.get(doc_id as usize) else {
                continue;
            };
            if doc.get(field).map(|v| regex.is_match(v)).unwrap_or(false) {
                hits.insert(doc_id);
            }
        }
        Ok(hits)
    }

    fn eval_bool(
        &self,
        must: &[IndexQuery],
        must_not: &[IndexQuery],
        should: &[IndexQuery],
    ) -> Result<RoaringBitmap, QueryError> {
        let mut base: Option<RoaringBitmap> = None;

        for sub in must {
            let hits = self.eval(sub)?;
            base = Some(match base {
                Some(mut existing) => {
                    existing &= &hits;
                    existing
                }
                None => hits,
            });
        }

        if !should.is_empty() {
            let mut union = RoaringBitmap::new();
            for sub in should {
                union |= self.eval(sub)?;
            }
            base = Some(match base {
                // With must clauses present, should clauses are optional
                Some(existing) => existing,
                None => union,
            });
        }

        let mut result = base.unwrap_or_else(|| {
            // Pure-negative query: start from everything live
            self.state.live.clone()
        });

        for sub in must_not {
            let hits = self.eval(sub)?;
            result -= &hits;
        }

        Ok(result)
    }
}
