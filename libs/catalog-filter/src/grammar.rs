//! The normative filter grammar from the specification:
//!
//! ```text
//! query       := condition (AND condition)*
//! condition   := field op value
//! op          := '!=' | '>=' | '<=' | '=' | '>' | '<' | ' LIKE '
//! value       := '"' anything-except-" '"' | "'" anything-except-' "'"
//!               | bare (stripped of surrounding quotes)
//! ```
//!
//! Operators are matched longest-first so `=` never eats `>=`. `AND` is
//! matched case-insensitively and splits once per occurrence, left to
//! right, skipping quoted regions so a value containing the literal text
//! "and" is never mistaken for a conjunction.

use catalog_errors::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}

impl Op {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: String,
}

/// Longest-first so e.g. `>=` is preferred over `>` at the same position.
const COMPARISON_TOKENS: &[(&str, Op)] = &[
    ("!=", Op::Ne),
    (">=", Op::Ge),
    ("<=", Op::Le),
    ("=", Op::Eq),
    (">", Op::Gt),
    ("<", Op::Lt),
];

/// Rejects control characters that have no business in a query string.
fn sanitize(query: &str) -> Result<(), CatalogError> {
    if query
        .chars()
        .any(|c| c.is_control() && c != '\t')
    {
        return Err(CatalogError::bad_request(
            "filterQuery contains forbidden control characters",
        ));
    }
    Ok(())
}

/// Splits `query` into its AND-joined condition substrings, case-insensitive
/// on the `AND` keyword, ignoring occurrences inside quoted values.
fn split_conditions(query: &str) -> Vec<String> {
    let chars: Vec<char> = query.chars().collect();
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut quote: Option<char> = None;
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
            i += 1;
            continue;
        }
        // Look for a standalone "AND" token (case-insensitive, word-bounded).
        if (c == 'a' || c == 'A') && i + 3 <= chars.len() {
            let word: String = chars[i..i + 3].iter().collect();
            let boundary_before = i == 0 || chars[i - 1].is_whitespace();
            let boundary_after = i + 3 == chars.len() || chars[i + 3].is_whitespace();
            if word.eq_ignore_ascii_case("and") && boundary_before && boundary_after {
                let segment: String = chars[start..i].iter().collect();
                out.push(segment.trim().to_owned());
                i += 3;
                start = i;
                continue;
            }
        }
        i += 1;
    }
    let tail: String = chars[start..].iter().collect();
    out.push(tail.trim().to_owned());
    out.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Finds the earliest, longest-matching operator outside quoted regions.
fn find_operator(condition: &str) -> Option<(usize, usize, Op)> {
    let chars: Vec<char> = condition.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
            i += 1;
            continue;
        }
        // " LIKE " — word-bounded, case-insensitive.
        if c.is_whitespace() && i + 6 <= chars.len() {
            let word: String = chars[i + 1..i + 5].iter().collect();
            if word.eq_ignore_ascii_case("like") && chars.get(i + 5).is_some_and(|c| c.is_whitespace()) {
                return Some((i, i + 6, Op::Like));
            }
        }
        for (tok, op) in COMPARISON_TOKENS {
            let tok_chars: Vec<char> = tok.chars().collect();
            if chars[i..].starts_with(tok_chars.as_slice()) {
                return Some((i, i + tok_chars.len(), *op));
            }
        }
        i += 1;
    }
    None
}

fn strip_quotes(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return trimmed[1..trimmed.len() - 1].to_owned();
        }
    }
    trimmed.to_owned()
}

/// Parses a `filterQuery` string into AND-joined conditions.
///
/// # Errors
/// Returns `CatalogError::BadRequest` for unparsable conditions or forbidden
/// characters.
pub fn parse_filter(query: &str) -> Result<Vec<Condition>, CatalogError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    sanitize(query)?;

    let mut conditions = Vec::new();
    for segment in split_conditions(query) {
        let (start, end, op) = find_operator(&segment).ok_or_else(|| {
            CatalogError::bad_request(format!("invalid filter condition: '{segment}'"))
        })?;
        let field = segment[..segment.char_indices().nth(start).map_or(0, |(b, _)| b)]
            .trim()
            .to_owned();
        let value_start = segment
            .char_indices()
            .nth(end)
            .map_or(segment.len(), |(b, _)| b);
        let raw_value = &segment[value_start..];
        if field.is_empty() {
            return Err(CatalogError::bad_request(format!(
                "missing field name in condition: '{segment}'"
            )));
        }
        conditions.push(Condition {
            field,
            op,
            value: strip_quotes(raw_value),
        });
    }
    Ok(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_equality() {
        let conds = parse_filter("transportType='http'").unwrap();
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].field, "transportType");
        assert_eq!(conds[0].op, Op::Eq);
        assert_eq!(conds[0].value, "http");
    }

    #[test]
    fn prefers_longest_operator() {
        let conds = parse_filter("count>=5").unwrap();
        assert_eq!(conds[0].op, Op::Ge);
        assert_eq!(conds[0].value, "5");
    }

    #[test]
    fn splits_on_case_insensitive_and() {
        let conds = parse_filter("a='x' and b!='y'").unwrap();
        assert_eq!(conds.len(), 2);
        assert_eq!(conds[1].op, Op::Ne);
    }

    #[test]
    fn like_operator_strips_percent_by_caller() {
        let conds = parse_filter("name LIKE '%gpt%'").unwrap();
        assert_eq!(conds[0].op, Op::Like);
        assert_eq!(conds[0].value, "%gpt%");
    }

    #[test]
    fn and_inside_quotes_is_not_a_split_point() {
        let conds = parse_filter("name='Alice and Bob'").unwrap();
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].value, "Alice and Bob");
    }

    #[test]
    fn rejects_control_characters() {
        assert!(parse_filter("a='x\0y'").is_err());
    }

    #[test]
    fn rejects_malformed_condition() {
        assert!(parse_filter("justafield").is_err());
    }
}
