//! Document schema: pure mapping rules from graph objects to flat
//! field/value records.
//!
//! One entity or axiom occurrence produces zero or more documents; a single
//! entity may appear in many (its declaration, one per annotation, one per
//! restriction conjunct). Documents are immutable once added; removal is by
//! [`FilterSet`], never by handle.

use crate::ontology::{AnnotationValue, Axiom, Entity, Iri, OntologySource};
use crate::text::strip_markup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The closed set of indexed fields.
///
/// Tokenized fields are searchable by term/phrase/prefix/suffix/regex;
/// keyword fields hold one exact token and only support exact matching.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Subject entity identifier (tokenized so bare terms hit IRI parts).
    EntityIri,
    /// Subject display name.
    DisplayName,
    /// Entity kind tag, declaration documents only.
    EntityKind,
    /// Document category tag, present on every document.
    Category,
    /// Annotation property identifier.
    AnnotationIri,
    /// Annotation property display name, lowercased, for `field:value`.
    AnnotationName,
    /// Markup-stripped annotation literal.
    AnnotationText,
    /// Annotation value when it is a reference rather than literal text.
    AnnotationValueIri,
    /// Property of a restriction conjunct.
    RestrictionProperty,
    /// Named filler of a restriction conjunct; empty when the filler is
    /// not a simple named entity (empty and absent are distinct).
    RestrictionFiller,
    /// Axiom type tag of an other-logical document.
    LogicalKind,
    /// Rendered form of an other-logical axiom.
    LogicalText,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::EntityIri => "entity_iri",
            Field::DisplayName => "display_name",
            Field::EntityKind => "entity_kind",
            Field::Category => "category",
            Field::AnnotationIri => "annotation_iri",
            Field::AnnotationName => "annotation_name",
            Field::AnnotationText => "annotation_text",
            Field::AnnotationValueIri => "annotation_value_iri",
            Field::RestrictionProperty => "restriction_property",
            Field::RestrictionFiller => "restriction_filler",
            Field::LogicalKind => "logical_kind",
            Field::LogicalText => "logical_text",
        }
    }

    /// Whether values of this field are tokenized into terms.
    pub fn is_tokenized(&self) -> bool {
        matches!(
            self,
            Field::EntityIri | Field::DisplayName | Field::AnnotationText | Field::LogicalText
        )
    }
}

/// Category tag carried by every document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocCategory {
    Declaration,
    Annotation,
    Restriction,
    Logical,
}

impl DocCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocCategory::Declaration => "declaration",
            DocCategory::Annotation => "annotation",
            DocCategory::Restriction => "restriction",
            DocCategory::Logical => "logical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "declaration" => Some(DocCategory::Declaration),
            "annotation" => Some(DocCategory::Annotation),
            "restriction" => Some(DocCategory::Restriction),
            "logical" => Some(DocCategory::Logical),
            _ => None,
        }
    }
}

/// A flat, immutable field/value record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    fields: BTreeMap<Field, String>,
}

impl Document {
    pub fn new(category: DocCategory) -> Self {
        let mut doc = Self::default();
        doc.fields
            .insert(Field::Category, category.as_str().to_string());
        doc
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn category(&self) -> Option<DocCategory> {
        self.get(Field::Category).and_then(DocCategory::parse)
    }

    /// Subject entity identifier this document resolves back to.
    pub fn subject(&self) -> Option<Iri> {
        self.get(Field::EntityIri).map(Iri::new)
    }
}

/// Conjunction of exact (field, value) pairs selecting documents for
/// deletion: a document is deleted iff every pair matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FilterSet {
    fields: BTreeMap<Field, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn pairs(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All pairs must match the document's stored values exactly.
    pub fn matches(&self, doc: &Document) -> bool {
        !self.fields.is_empty()
            && self
                .fields
                .iter()
                .all(|(field, value)| doc.get(*field) == Some(value.as_str()))
    }
}

/// Project a declared entity into its declaration document.
pub fn project_entity(entity: &Entity) -> Document {
    Document::new(DocCategory::Declaration)
        .with(Field::EntityIri, entity.iri.as_str())
        .with(Field::DisplayName, &entity.label)
        .with(Field::EntityKind, entity.kind.as_str())
}

/// Project one axiom into documents. Unresolvable annotation subjects are
/// skipped silently; this is a documented no-op, not an error.
pub fn project_axiom(axiom: &Axiom, source: &dyn OntologySource) -> Vec<Document> {
    match axiom {
        Axiom::Declaration(entity) => vec![project_entity(entity)],

        Axiom::AnnotationAssertion {
            subject,
            property,
            value,
        } => {
            let Some(entity) = source.lookup(subject) else {
                debug!(subject = %subject, "annotation subject not in signature, skipping");
                return Vec::new();
            };

            let doc = Document::new(DocCategory::Annotation)
                .with(Field::EntityIri, entity.iri.as_str())
                .with(Field::DisplayName, &entity.label)
                .with(Field::AnnotationIri, property.iri.as_str())
                .with(Field::AnnotationName, property.label.to_lowercase());

            let doc = match value {
                AnnotationValue::Literal(text) => doc.with(Field::AnnotationText, strip_markup(text)),
                AnnotationValue::Reference(iri) => doc.with(Field::AnnotationValueIri, iri.as_str()),
            };

            vec![doc]
        }

        Axiom::SubClassOf {
            subclass,
            superclass,
        } => restriction_documents(subclass, superclass.restrictions(), source),

        Axiom::EquivalentClasses { class, expression } => {
            restriction_documents(class, expression.restrictions(), source)
        }

        Axiom::Logical {
            subject,
            kind,
            rendered,
        } => {
            let display = source
                .lookup(subject)
                .map(|e| e.label)
                .unwrap_or_else(|| subject.short_form().to_string());

            vec![
                Document::new(DocCategory::Logical)
                    .with(Field::EntityIri, subject.as_str())
                    .with(Field::DisplayName, display)
                    .with(Field::LogicalKind, kind)
                    .with(Field::LogicalText, rendered),
            ]
        }
    }
}

/// Mirrored filter construction: the filters that identify exactly the
/// documents [`project_axiom`] would produce for this axiom.
pub fn filters_for_axiom(axiom: &Axiom, source: &dyn OntologySource) -> Vec<FilterSet> {
    match axiom {
        Axiom::Declaration(entity) => vec![
            FilterSet::new()
                .with(Field::EntityIri, entity.iri.as_str())
                .with(Field::EntityKind, entity.kind.as_str()),
        ],

        Axiom::AnnotationAssertion {
            subject,
            property,
            value,
        } => {
            if source.lookup(subject).is_none() {
                debug!(subject = %subject, "annotation subject not in signature, skipping");
                return Vec::new();
            }

            let filter = FilterSet::new()
                .with(Field::EntityIri, subject.as_str())
                .with(Field::AnnotationIri, property.iri.as_str());

            let filter = match value {
                AnnotationValue::Literal(text) => {
                    filter.with(Field::AnnotationText, strip_markup(text))
                }
                AnnotationValue::Reference(iri) => {
                    filter.with(Field::AnnotationValueIri, iri.as_str())
                }
            };

            vec![filter]
        }

        Axiom::SubClassOf {
            subclass,
            superclass,
        } => restriction_filters(subclass, superclass.restrictions()),

        Axiom::EquivalentClasses { class, expression } => {
            restriction_filters(class, expression.restrictions())
        }

        Axiom::Logical {
            subject,
            kind,
            rendered,
        } => vec![
            FilterSet::new()
                .with(Field::EntityIri, subject.as_str())
                .with(Field::LogicalKind, kind)
                .with(Field::LogicalText, rendered),
        ],
    }
}

fn restriction_documents(
    subclass: &Iri,
    restrictions: Vec<(&Iri, Option<&Iri>)>,
    source: &dyn OntologySource,
) -> Vec<Document> {
    let display = source
        .lookup(subclass)
        .map(|e| e.label)
        .unwrap_or_else(|| subclass.short_form().to_string());

    restrictions
        .into_iter()
        .map(|(property, filler)| {
            Document::new(DocCategory::Restriction)
                .with(Field::EntityIri, subclass.as_str())
                .with(Field::DisplayName, display.clone())
                .with(Field::RestrictionProperty, property.as_str())
                .with(
                    Field::RestrictionFiller,
                    filler.map(Iri::as_str).unwrap_or(""),
                )
        })
        .collect()
}

fn restriction_filters(subclass: &Iri, restrictions: Vec<(&Iri, Option<&Iri>)>) -> Vec<FilterSet> {
    restrictions
        .into_iter()
        .map(|(property, filler)| {
            FilterSet::new()
                .with(Field::Category, DocCategory::Restriction.as_str())
                .with(Field::EntityIri, subclass.as_str())
                .with(Field::RestrictionProperty, property.as_str())
                .with(
                    Field::RestrictionFiller,
                    filler.map(Iri::as_str).unwrap_or(""),
                )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::{ClassExpression, EntityKind, MemoryOntology};

    fn source_with_koala() -> MemoryOntology {
        let mut ontology = MemoryOntology::new();
        ontology.declare(Entity::new(
            "http://example.org/animals#Koala",
            "Koala",
            EntityKind::Class,
        ));
        ontology.declare(Entity::new(
            "http://www.w3.org/2000/01/rdf-schema#label",
            "label",
            EntityKind::AnnotationProperty,
        ));
        ontology
    }

    fn label_property() -> Entity {
        Entity::new(
            "http://www.w3.org/2000/01/rdf-schema#label",
            "label",
            EntityKind::AnnotationProperty,
        )
    }

    #[test]
    fn test_declaration_projection() {
        let entity = Entity::new("http://example.org/animals#Koala", "Koala", EntityKind::Class);
        let doc = project_entity(&entity);
        assert_eq!(doc.category(), Some(DocCategory::Declaration));
        assert_eq!(doc.get(Field::EntityIri), Some("http://example.org/animals#Koala"));
        assert_eq!(doc.get(Field::EntityKind), Some("class"));
    }

    #[test]
    fn test_annotation_projection_literal() {
        let source = source_with_koala();
        let axiom = Axiom::AnnotationAssertion {
            subject: Iri::new("http://example.org/animals#Koala"),
            property: label_property(),
            value: AnnotationValue::Literal("\"Koala\"@en".to_string()),
        };

        let docs = project_axiom(&axiom, &source);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get(Field::AnnotationText), Some("Koala"));
        assert_eq!(docs[0].get(Field::AnnotationName), Some("label"));
        assert!(docs[0].get(Field::AnnotationValueIri).is_none());
    }

    #[test]
    fn test_annotation_projection_reference() {
        let source = source_with_koala();
        let axiom = Axiom::AnnotationAssertion {
            subject: Iri::new("http://example.org/animals#Koala"),
            property: label_property(),
            value: AnnotationValue::Reference(Iri::new("http://example.org/doc#1")),
        };

        let docs = project_axiom(&axiom, &source);
        assert_eq!(docs[0].get(Field::AnnotationValueIri), Some("http://example.org/doc#1"));
        assert!(docs[0].get(Field::AnnotationText).is_none());
    }

    #[test]
    fn test_unresolved_annotation_subject_is_skipped() {
        let source = source_with_koala();
        let axiom = Axiom::AnnotationAssertion {
            subject: Iri::new("http://example.org/unknown#X"),
            property: label_property(),
            value: AnnotationValue::Literal("ghost".to_string()),
        };
        assert!(project_axiom(&axiom, &source).is_empty());
        assert!(filters_for_axiom(&axiom, &source).is_empty());
    }

    #[test]
    fn test_restriction_projection_empty_filler() {
        let source = source_with_koala();
        let axiom = Axiom::SubClassOf {
            subclass: Iri::new("http://example.org/animals#Koala"),
            superclass: ClassExpression::Intersection(vec![
                ClassExpression::Named(Iri::new("http://example.org/animals#Marsupial")),
                ClassExpression::Restriction {
                    property: Iri::new("http://example.org/animals#eats"),
                    filler: None,
                },
            ]),
        };

        let docs = project_axiom(&axiom, &source);
        assert_eq!(docs.len(), 1);
        // Empty, not absent
        assert_eq!(docs[0].get(Field::RestrictionFiller), Some(""));
    }

    #[test]
    fn test_filters_mirror_documents() {
        let source = source_with_koala();
        let axiom = Axiom::AnnotationAssertion {
            subject: Iri::new("http://example.org/animals#Koala"),
            property: label_property(),
            value: AnnotationValue::Literal("Koala".to_string()),
        };

        let docs = project_axiom(&axiom, &source);
        let filters = filters_for_axiom(&axiom, &source);
        assert_eq!(filters.len(), 1);
        assert!(filters[0].matches(&docs[0]));
    }

    #[test]
    fn test_filter_requires_all_pairs() {
        let doc = Document::new(DocCategory::Declaration)
            .with(Field::EntityIri, "a")
            .with(Field::EntityKind, "class");
        let filter = FilterSet::new()
            .with(Field::EntityIri, "a")
            .with(Field::EntityKind, "object_property");
        assert!(!filter.matches(&doc));
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let doc = Document::new(DocCategory::Declaration).with(Field::EntityIri, "a");
        assert!(!FilterSet::new().matches(&doc));
    }
}
