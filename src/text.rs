//! Text utilities shared by the index writer and the query side.
//!
//! Tokenization must agree between the two: a value indexed here is found
//! by a term query only if both sides lowercase and split identically.

/// Extract lowercase tokens from a field value.
///
/// Tokens are maximal alphanumeric runs; everything else is a separator.
/// IRIs tokenize naturally this way (`http://example.org/Koala` yields
/// `http`, `example`, `org`, `koala`).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                current.push(lower);
            }
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Check whether `haystack` contains `phrase` as a whole-word substring.
///
/// Used as the verification step after token narrowing: the characters
/// adjacent to the match must not be alphanumeric, so "oala" never matches
/// inside "Koala".
pub fn contains_phrase(haystack: &str, phrase: &str, case_sensitive: bool) -> bool {
    if phrase.is_empty() {
        return false;
    }

    let (hay, needle) = if case_sensitive {
        (haystack.to_string(), phrase.to_string())
    } else {
        (haystack.to_lowercase(), phrase.to_lowercase())
    };

    let mut from = 0;
    while let Some(pos) = hay[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();

        let boundary_before = hay[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let boundary_after = hay[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);

        if boundary_before && boundary_after {
            return true;
        }

        from = start + needle.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        if from >= hay.len() {
            break;
        }
    }

    false
}

/// Strip markup from an annotation literal before indexing.
///
/// Removes `<...>` tag spans, drops a trailing `@lang` or `^^type` literal
/// suffix, and collapses runs of whitespace to a single space.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;

    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                // Tags act as separators so "a<br>b" keeps a word break
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    // Trailing literal suffixes: "text"@en or "3"^^xsd:int
    let trimmed = out.trim();
    let without_suffix = if let Some(pos) = trimmed.rfind("^^") {
        &trimmed[..pos]
    } else if let Some(pos) = trimmed.rfind('@') {
        // Only strip when it looks like a language tag, not an email address
        let tag = &trimmed[pos + 1..];
        if !tag.is_empty() && tag.len() <= 8 && tag.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
        {
            &trimmed[..pos]
        } else {
            trimmed
        }
    } else {
        trimmed
    };

    let cleaned = without_suffix.trim_matches('"');

    let mut collapsed = String::with_capacity(cleaned.len());
    let mut prev_space = false;
    for ch in cleaned.chars() {
        if ch.is_whitespace() {
            if !prev_space && !collapsed.is_empty() {
                collapsed.push(' ');
            }
            prev_space = true;
        } else {
            collapsed.push(ch);
            prev_space = false;
        }
    }

    collapsed.trim_end().to_string()
}
