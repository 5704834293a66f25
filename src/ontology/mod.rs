//! The entity/axiom graph consumed by the indexer.
//!
//! The engine treats the ontology as an external collaborator: it only needs
//! a snapshot of entities and axioms, entity lookup by IRI, and a stream of
//! typed edits. [`MemoryOntology`] is the bundled implementation, with a
//! serde JSON snapshot format used by the CLI and the test suite.
//!
//! Axioms are a closed tagged union over the shapes the indexer projects;
//! a single exhaustive match replaces the visitor double-dispatch a more
//! open model would need.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Stable string identifier of a domain object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fragment or last path segment, used as a display-name fallback.
    pub fn short_form(&self) -> &str {
        let s = self.0.as_str();
        match s.rfind(['#', '/']) {
            Some(pos) if pos + 1 < s.len() => &s[pos + 1..],
            _ => s,
        }
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Iri {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kind of a declared entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Class,
    ObjectProperty,
    DataProperty,
    AnnotationProperty,
    NamedIndividual,
    Datatype,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Class => "class",
            EntityKind::ObjectProperty => "object_property",
            EntityKind::DataProperty => "data_property",
            EntityKind::AnnotationProperty => "annotation_property",
            EntityKind::NamedIndividual => "named_individual",
            EntityKind::Datatype => "datatype",
        }
    }
}

/// A declared entity: identifier, human-readable name, kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub iri: Iri,
    pub label: String,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(iri: impl Into<Iri>, label: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            iri: iri.into(),
            label: label.into(),
            kind,
        }
    }
}

/// Value of an annotation assertion: literal text or a reference to
/// another identified object. The two project into different fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationValue {
    Literal(String),
    Reference(Iri),
}

/// Class expression, reduced to the shapes the projector consumes.
///
/// `Restriction` with `filler: None` models a restriction whose filler is
/// not a simple named entity; it projects into an empty (not absent)
/// filler field so downstream can distinguish the two.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassExpression {
    Named(Iri),
    Restriction {
        property: Iri,
        filler: Option<Iri>,
    },
    Intersection(Vec<ClassExpression>),
}

impl ClassExpression {
    /// Collect all restriction conjuncts, recursing through intersections.
    pub fn restrictions(&self) -> Vec<(&Iri, Option<&Iri>)> {
        let mut out = Vec::new();
        self.collect_restrictions(&mut out);
        out
    }

    fn collect_restrictions<'a>(&'a self, out: &mut Vec<(&'a Iri, Option<&'a Iri>)>) {
        match self {
            ClassExpression::Named(_) => {}
            ClassExpression::Restriction { property, filler } => {
                out.push((property, filler.as_ref()));
            }
            ClassExpression::Intersection(parts) => {
                for part in parts {
                    part.collect_restrictions(out);
                }
            }
        }
    }
}

/// Typed assertion over entities. Only these shapes are indexed; every
/// other logical axiom arrives pre-rendered as [`Axiom::Logical`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axiom {
    Declaration(Entity),
    AnnotationAssertion {
        subject: Iri,
        property: Entity,
        value: AnnotationValue,
    },
    SubClassOf {
        subclass: Iri,
        superclass: ClassExpression,
    },
    EquivalentClasses {
        class: Iri,
        expression: ClassExpression,
    },
    Logical {
        subject: Iri,
        kind: String,
        rendered: String,
    },
}

impl Axiom {
    /// Structural subject of the axiom.
    pub fn subject(&self) -> &Iri {
        match self {
            Axiom::Declaration(entity) => &entity.iri,
            Axiom::AnnotationAssertion { subject, .. } => subject,
            Axiom::SubClassOf { subclass, .. } => subclass,
            Axiom::EquivalentClasses { class, .. } => class,
            Axiom::Logical { subject, .. } => subject,
        }
    }
}

/// One element of an edit batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxiomChange {
    Add(Axiom),
    Remove(Axiom),
}

/// Abstract graph source the engine indexes.
///
/// Implementations must be cheap to query for `lookup`; the projector calls
/// it once per annotation subject.
pub trait OntologySource: Send + Sync {
    /// All declared entities.
    fn entities(&self) -> Vec<Entity>;

    /// All non-declaration axioms. Declarations are implied by `entities`.
    fn axioms(&self) -> Vec<Axiom>;

    /// Resolve an entity by identifier. `None` for unknown IRIs.
    fn lookup(&self, iri: &Iri) -> Option<Entity>;

    /// All entity identifiers currently in signature. This is the universe
    /// used to complement negated queries.
    fn signature(&self) -> Vec<Iri>;
}

/// Serialized form of a [`MemoryOntology`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OntologySnapshot {
    pub entities: Vec<Entity>,
    pub axioms: Vec<Axiom>,
}

/// Failure loading an ontology snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory ontology used by the CLI and tests.
#[derive(Default)]
pub struct MemoryOntology {
    entities: FxHashMap<Iri, Entity>,
    axioms: Vec<Axiom>,
}

impl MemoryOntology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON snapshot file.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let data = std::fs::read_to_string(path)?;
        let snapshot: OntologySnapshot = serde_json::from_str(&data)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: OntologySnapshot) -> Self {
        let mut ontology = Self::new();
        for entity in snapshot.entities {
            ontology.declare(entity);
        }
        for axiom in snapshot.axioms {
            ontology.assert_axiom(axiom);
        }
        ontology
    }

    pub fn declare(&mut self, entity: Entity) {
        self.entities.insert(entity.iri.clone(), entity);
    }

    /// Assert an axiom. Re-asserting an already-present axiom is a no-op so
    /// delta computation stays idempotent.
    pub fn assert_axiom(&mut self, axiom: Axiom) {
        match axiom {
            Axiom::Declaration(entity) => self.declare(entity),
            other => {
                if !self.axioms.contains(&other) {
                    self.axioms.push(other);
                }
            }
        }
    }

    pub fn retract_axiom(&mut self, axiom: &Axiom) {
        match axiom {
            Axiom::Declaration(entity) => {
                self.entities.remove(&entity.iri);
            }
            other => self.axioms.retain(|a| a != other),
        }
    }

    /// Apply an edit batch to the graph itself (the index is updated
    /// separately through the change projector).
    pub fn apply(&mut self, edits: &[AxiomChange]) {
        for edit in edits {
            match edit {
                AxiomChange::Add(axiom) => self.assert_axiom(axiom.clone()),
                AxiomChange::Remove(axiom) => self.retract_axiom(axiom),
            }
        }
    }

    pub fn axiom_count(&self) -> usize {
        self.axioms.len() + self.entities.len()
    }
}

impl OntologySource for MemoryOntology {
    fn entities(&self) -> Vec<Entity> {
        let mut all: Vec<Entity> = self.entities.values().cloned().collect();
        all.sort_by(|a, b| a.iri.cmp(&b.iri));
        all
    }

    fn axioms(&self) -> Vec<Axiom> {
        self.axioms.clone()
    }

    fn lookup(&self, iri: &Iri) -> Option<Entity> {
        self.entities.get(iri).cloned()
    }

    fn signature(&self) -> Vec<Iri> {
        self.entities.keys().cloned().collect()
    }
}
