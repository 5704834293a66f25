//! Result sets and the set algebra used to combine them.
//!
//! A result set holds entity identifiers, not documents: every hit
//! document is resolved back to its subject before it reaches this layer.
//! Sets are unordered; callers must not rely on iteration order.

use crate::ontology::Iri;
use rustc_hash::FxHashSet;

/// An unordered set of entity identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSet {
    entities: FxHashSet<Iri>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iri: Iri) {
        self.entities.insert(iri);
    }

    pub fn contains(&self, iri: &Iri) -> bool {
        self.entities.contains(iri)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Iri> {
        self.entities.iter()
    }

    /// `a ∩ b`. Retains into the smaller of the two sets to bound work;
    /// this is a performance property, not a correctness one.
    pub fn intersect(self, other: ResultSet) -> ResultSet {
        let (mut small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.entities.retain(|iri| large.contains(iri));
        small
    }

    /// `a ∪ b`. Extends the larger set with the smaller.
    pub fn union(self, other: ResultSet) -> ResultSet {
        let (small, mut large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        large.entities.extend(small.entities);
        large
    }

    /// `a \ b`.
    pub fn difference(mut self, other: &ResultSet) -> ResultSet {
        self.entities.retain(|iri| !other.contains(iri));
        self
    }

    /// `universe \ a`.
    pub fn complement(&self, universe: ResultSet) -> ResultSet {
        universe.difference(self)
    }
}

impl FromIterator<Iri> for ResultSet {
    fn from_iter<T: IntoIterator<Item = Iri>>(iter: T) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = Iri;
    type IntoIter = <FxHashSet<Iri> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(iris: &[&str]) -> ResultSet {
        iris.iter().map(|s| Iri::new(*s)).collect()
    }

    #[test]
    fn test_intersect() {
        let a = set(&["a", "b", "c"]);
        let b = set(&["b", "c", "d"]);
        assert_eq!(a.intersect(b), set(&["b", "c"]));
    }

    #[test]
    fn test_union() {
        let a = set(&["a", "b"]);
        let b = set(&["b", "c"]);
        assert_eq!(a.union(b), set(&["a", "b", "c"]));
    }

    #[test]
    fn test_difference() {
        let a = set(&["a", "b", "c"]);
        let b = set(&["b"]);
        assert_eq!(a.difference(&b), set(&["a", "c"]));
    }

    #[test]
    fn test_absorption() {
        let a = set(&["a", "b"]);
        let b = set(&["b", "c", "d"]);
        let combined = a.clone().union(b).intersect(a.clone());
        assert_eq!(combined, a);
    }

    #[test]
    fn test_double_complement() {
        let universe = set(&["a", "b", "c", "d"]);
        let a = set(&["a", "b"]);
        let twice = a.complement(universe.clone()).complement(universe);
        assert_eq!(twice, a);
    }

    #[test]
    fn test_complement_of_empty_is_universe() {
        let universe = set(&["a", "b"]);
        assert_eq!(ResultSet::new().complement(universe.clone()), universe);
    }
}
