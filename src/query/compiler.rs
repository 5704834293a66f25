//! Query compiler: lowers a keyword tree into executable index queries.
//!
//! An unqualified keyword searches every category (identifier, display
//! name, annotation text, logical-axiom text) and unions the results; a
//! `field:value` keyword intersects an exact annotation-name term with a
//! value query on the annotation text. Compound nodes lower to the result
//! algebra; nested and negated nodes survive as their own variants because
//! they need the engine (filler re-projection, the signature universe) to
//! evaluate.

use crate::index::schema::Field;
use crate::index::searcher::IndexQuery;
use crate::ontology::Iri;
use crate::query::keyword::{Keyword, KeywordTree};
use tracing::debug;

/// Searchable categories an unqualified keyword fans out across.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    EntityIri,
    DisplayName,
    AnnotationText,
    LogicalText,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::EntityIri,
        Category::DisplayName,
        Category::AnnotationText,
        Category::LogicalText,
    ];

    pub fn field(&self) -> Field {
        match self {
            Category::EntityIri => Field::EntityIri,
            Category::DisplayName => Field::DisplayName,
            Category::AnnotationText => Field::AnnotationText,
            Category::LogicalText => Field::LogicalText,
        }
    }
}

/// A compiled query tree ready for execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompiledQuery {
    /// A single index-level query; one evaluation unit.
    Index(IndexQuery),
    /// Boolean combination over sub-results.
    Bool {
        must: Vec<CompiledQuery>,
        must_not: Vec<CompiledQuery>,
        should: Vec<CompiledQuery>,
    },
    /// Evaluate `filler`, then union restriction matches per filler entity.
    Restriction {
        property: Iri,
        filler: Box<CompiledQuery>,
    },
    /// Complement of `inner` against the full entity signature.
    Complement { inner: Box<CompiledQuery> },
}

impl CompiledQuery {
    /// Number of index-level evaluation units, used for progress and
    /// cancellation checkpoints. Restriction fan-out is not known until
    /// execution, so it counts as one unit here.
    pub fn unit_count(&self) -> u64 {
        match self {
            CompiledQuery::Index(_) => 1,
            CompiledQuery::Bool {
                must,
                must_not,
                should,
            } => must
                .iter()
                .chain(must_not)
                .chain(should)
                .map(CompiledQuery::unit_count)
                .sum::<u64>()
                .max(1),
            CompiledQuery::Restriction { filler, .. } => filler.unit_count() + 1,
            CompiledQuery::Complement { inner } => inner.unit_count(),
        }
    }

    fn empty() -> Self {
        CompiledQuery::Bool {
            must: Vec::new(),
            must_not: Vec::new(),
            should: Vec::new(),
        }
    }
}

/// Compile a keyword tree.
pub fn compile(tree: &KeywordTree) -> CompiledQuery {
    match tree {
        KeywordTree::Keyword(keyword) => compile_keyword(keyword),

        KeywordTree::And(children) => CompiledQuery::Bool {
            must: children.iter().map(compile).collect(),
            must_not: Vec::new(),
            should: Vec::new(),
        },

        KeywordTree::Or(children) => CompiledQuery::Bool {
            must: Vec::new(),
            must_not: Vec::new(),
            should: children.iter().map(compile).collect(),
        },

        KeywordTree::Not { inner, conjunctive } => {
            let combined = if *conjunctive {
                CompiledQuery::Bool {
                    must: inner.iter().map(compile).collect(),
                    must_not: Vec::new(),
                    should: Vec::new(),
                }
            } else {
                CompiledQuery::Bool {
                    must: Vec::new(),
                    must_not: Vec::new(),
                    should: inner.iter().map(compile).collect(),
                }
            };
            CompiledQuery::Complement {
                inner: Box::new(combined),
            }
        }

        KeywordTree::Nested { property, filler } => CompiledQuery::Restriction {
            property: property.clone(),
            filler: Box::new(compile(filler)),
        },

        KeywordTree::RestrictionPresent { property } => {
            CompiledQuery::Index(IndexQuery::Exact {
                field: Field::RestrictionProperty,
                value: property.as_str().to_string(),
            })
        }

        KeywordTree::RestrictionAbsent { property } => CompiledQuery::Complement {
            inner: Box::new(CompiledQuery::Index(IndexQuery::Exact {
                field: Field::RestrictionProperty,
                value: property.as_str().to_string(),
            })),
        },

        KeywordTree::Empty => {
            debug!("empty keyword tree compiles to the empty query");
            CompiledQuery::empty()
        }
    }
}

fn compile_keyword(keyword: &Keyword) -> CompiledQuery {
    match &keyword.field {
        // field:value intersects an exact annotation-name term with the
        // value query on the annotation text
        Some(field) => CompiledQuery::Bool {
            must: vec![
                CompiledQuery::Index(IndexQuery::Exact {
                    field: Field::AnnotationName,
                    value: field.to_lowercase(),
                }),
                CompiledQuery::Index(leaf_query(keyword, Field::AnnotationText)),
            ],
            must_not: Vec::new(),
            should: Vec::new(),
        },

        // Unqualified keywords search every category and union
        None => CompiledQuery::Bool {
            must: Vec::new(),
            must_not: Vec::new(),
            should: Category::ALL
                .iter()
                .map(|category| CompiledQuery::Index(leaf_query(keyword, category.field())))
                .collect(),
        },
    }
}

/// Lower one keyword to a single-field index query.
///
/// A trailing `*` compiles to a prefix query and a leading `*` to a
/// suffix query; wildcards only apply to single bare terms.
fn leaf_query(keyword: &Keyword, field: Field) -> IndexQuery {
    if keyword.regex {
        return IndexQuery::Regex {
            field,
            pattern: keyword.value.clone(),
        };
    }

    if !keyword.whole_word && !keyword.case_sensitive {
        if let Some(prefix) = keyword.value.strip_suffix('*') {
            if !prefix.is_empty() && !prefix.contains('*') {
                return IndexQuery::Prefix {
                    field,
                    prefix: prefix.to_string(),
                };
            }
        }
        if let Some(suffix) = keyword.value.strip_prefix('*') {
            if !suffix.is_empty() && !suffix.contains('*') {
                return IndexQuery::Suffix {
                    field,
                    suffix: suffix.to_string(),
                };
            }
        }
    }

    let multi_word = keyword.value.split_whitespace().nth(1).is_some();
    if keyword.whole_word || keyword.case_sensitive || multi_word {
        return IndexQuery::Phrase {
            field,
            text: keyword.value.clone(),
            case_sensitive: keyword.case_sensitive,
        };
    }

    IndexQuery::Term {
        field,
        term: keyword.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::keyword::parse_keywords;

    #[test]
    fn test_unqualified_keyword_fans_out() {
        let compiled = compile(&parse_keywords("koala"));
        let CompiledQuery::Bool { should, .. } = compiled else {
            panic!("expected Bool");
        };
        assert_eq!(should.len(), Category::ALL.len());
    }

    #[test]
    fn test_qualified_keyword_intersects() {
        let compiled = compile(&parse_keywords("label:koala"));
        let CompiledQuery::Bool { must, .. } = compiled else {
            panic!("expected Bool");
        };
        assert_eq!(must.len(), 2);
        assert_eq!(
            must[0],
            CompiledQuery::Index(IndexQuery::Exact {
                field: Field::AnnotationName,
                value: "label".to_string(),
            })
        );
    }

    #[test]
    fn test_regex_flag_compiles_to_regex_leaf() {
        let compiled = compile(&parse_keywords("label:/ko.la/"));
        let CompiledQuery::Bool { must, .. } = compiled else {
            panic!("expected Bool");
        };
        assert!(matches!(
            must[1],
            CompiledQuery::Index(IndexQuery::Regex { .. })
        ));
    }

    #[test]
    fn test_phrase_for_whole_word() {
        let compiled = compile(&KeywordTree::Keyword(Keyword {
            value: "koala".to_string(),
            whole_word: true,
            ..Keyword::default()
        }));
        let CompiledQuery::Bool { should, .. } = compiled else {
            panic!("expected Bool");
        };
        assert!(matches!(
            should[0],
            CompiledQuery::Index(IndexQuery::Phrase { .. })
        ));
    }

    #[test]
    fn test_wildcards_compile_to_prefix_and_suffix() {
        let compiled = compile(&parse_keywords("koa*"));
        let CompiledQuery::Bool { should, .. } = compiled else {
            panic!("expected Bool");
        };
        assert_eq!(
            should[0],
            CompiledQuery::Index(IndexQuery::Prefix {
                field: Field::EntityIri,
                prefix: "koa".to_string(),
            })
        );

        let compiled = compile(&parse_keywords("*roo"));
        let CompiledQuery::Bool { should, .. } = compiled else {
            panic!("expected Bool");
        };
        assert_eq!(
            should[1],
            CompiledQuery::Index(IndexQuery::Suffix {
                field: Field::DisplayName,
                suffix: "roo".to_string(),
            })
        );
    }

    #[test]
    fn test_negation_compiles_to_complement() {
        let compiled = compile(&parse_keywords("-koala"));
        assert!(matches!(compiled, CompiledQuery::Complement { .. }));
    }

    #[test]
    fn test_restriction_absent_is_complement_of_present() {
        let property = Iri::new("http://example.org/eats");
        let present = compile(&KeywordTree::RestrictionPresent {
            property: property.clone(),
        });
        let absent = compile(&KeywordTree::RestrictionAbsent { property });
        assert_eq!(
            absent,
            CompiledQuery::Complement {
                inner: Box::new(present)
            }
        );
    }

    #[test]
    fn test_unit_count() {
        let compiled = compile(&parse_keywords("koala bear"));
        assert_eq!(compiled.unit_count(), 8);
    }
}
