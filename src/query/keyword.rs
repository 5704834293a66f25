//! The keyword tree and the user-facing query grammar.
//!
//! Grammar: tokens are whitespace separated, each optionally prefixed
//! `+`/`-` for include/exclude and optionally qualified `field:`. Groups
//! separated by `,` or `|` are OR-ed; `&` inside a group separates AND-ed
//! tokens (plain whitespace does too). Double-quoted phrases are kept
//! verbatim and match whole words; `/pattern/` values are regexes.
//!
//! Nested (restriction) queries and restriction-present/absent queries
//! have no string syntax; they are built programmatically by the caller.

use crate::ontology::Iri;

/// A single search keyword.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keyword {
    /// Annotation-property qualifier (`field:value`); `None` searches all
    /// categories.
    pub field: Option<String>,
    pub value: String,
    /// Match whole words only (set for quoted phrases).
    pub whole_word: bool,
    /// Treat the value as a regex, bypassing tokenization.
    pub regex: bool,
    /// Verify matches case-sensitively.
    pub case_sensitive: bool,
}

impl Keyword {
    pub fn term(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn fielded(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Parsed user query: keywords and the combinators over them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeywordTree {
    Keyword(Keyword),
    And(Vec<KeywordTree>),
    Or(Vec<KeywordTree>),
    /// Negation: evaluate the inner trees (AND-ed when `conjunctive`,
    /// OR-ed otherwise) and complement against the full entity signature.
    Not {
        inner: Vec<KeywordTree>,
        conjunctive: bool,
    },
    /// Restriction re-projection: evaluate the filler sub-query, then
    /// union restriction matches `(property, filler-entity)` per filler.
    Nested {
        property: Iri,
        filler: Box<KeywordTree>,
    },
    /// All entities bearing a restriction on this property.
    RestrictionPresent { property: Iri },
    /// All entities in signature bearing no restriction on this property.
    RestrictionAbsent { property: Iri },
    Empty,
}

/// Parse a query string into a keyword tree.
pub fn parse_keywords(input: &str) -> KeywordTree {
    let groups = split_groups(input);
    let mut parsed: Vec<KeywordTree> = groups
        .iter()
        .map(|tokens| parse_group(tokens))
        .filter(|tree| !matches!(tree, KeywordTree::Empty))
        .collect();

    match parsed.len() {
        0 => KeywordTree::Empty,
        1 => parsed.pop().expect("one group"),
        _ => KeywordTree::Or(parsed),
    }
}

/// Split the input into OR groups of raw tokens, honoring quotes.
fn split_groups(input: &str) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    let flush_token = |tokens: &mut Vec<String>, current: &mut String| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' | '|' if !in_quotes => {
                flush_token(&mut tokens, &mut current);
                if !tokens.is_empty() {
                    groups.push(std::mem::take(&mut tokens));
                }
            }
            '&' if !in_quotes => flush_token(&mut tokens, &mut current),
            c if c.is_whitespace() && !in_quotes => flush_token(&mut tokens, &mut current),
            _ => current.push(ch),
        }
    }

    flush_token(&mut tokens, &mut current);
    if !tokens.is_empty() {
        groups.push(tokens);
    }
    groups
}

/// Parse one AND group: includes and excludes fold into And + Not.
fn parse_group(tokens: &[String]) -> KeywordTree {
    let mut includes = Vec::new();
    let mut excludes = Vec::new();

    for token in tokens {
        let (negated, rest) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token.strip_prefix('+').unwrap_or(token)),
        };

        let Some(keyword) = parse_token(rest) else {
            continue;
        };

        if negated {
            excludes.push(KeywordTree::Keyword(keyword));
        } else {
            includes.push(KeywordTree::Keyword(keyword));
        }
    }

    if includes.is_empty() && excludes.is_empty() {
        return KeywordTree::Empty;
    }

    let mut children = includes;
    if !excludes.is_empty() {
        children.push(KeywordTree::Not {
            inner: excludes,
            conjunctive: false,
        });
    }

    if children.len() == 1 {
        children.pop().expect("one child")
    } else {
        KeywordTree::And(children)
    }
}

/// Parse one raw token into a keyword: optional `field:` qualifier, then
/// quoted phrase, regex, or bare value.
fn parse_token(token: &str) -> Option<Keyword> {
    if token.is_empty() {
        return None;
    }

    // Field qualifier ends at the first ':' that is not part of the value
    let (field, value) = match token.find(':') {
        Some(pos) if pos > 0 && !token.starts_with('"') && !token.starts_with('/') => {
            let field = &token[..pos];
            let value = &token[pos + 1..];
            if field.contains('"') || value.is_empty() {
                (None, token)
            } else {
                (Some(field.to_string()), value)
            }
        }
        _ => (None, token),
    };

    let mut keyword = Keyword {
        field,
        ..Keyword::default()
    };

    if let Some(quoted) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        if quoted.is_empty() {
            return None;
        }
        keyword.value = quoted.to_string();
        keyword.whole_word = true;
    } else if let Some(pattern) = value
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
    {
        if pattern.is_empty() {
            return None;
        }
        keyword.value = pattern.to_string();
        keyword.regex = true;
    } else {
        keyword.value = value.to_string();
    }

    Some(keyword)
}
