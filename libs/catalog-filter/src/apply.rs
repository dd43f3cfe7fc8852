//! Evaluates parsed [`Condition`]s against plugin entities.
//!
//! Plugins whitelist which fields are filterable by implementing
//! [`Filterable::field_value`] only for known fields and returning an empty
//! string otherwise — per spec.md §9's open question, an unknown field is
//! treated as present-but-empty, not as a parse error.

use crate::grammar::{Condition, Op};

pub trait Filterable {
    /// Returns the stringified value of `field` for this entity, or an
    /// empty string if `field` is not recognized.
    fn field_value(&self, field: &str) -> String;
}

fn matches_one(value: &str, cond: &Condition) -> bool {
    match cond.op {
        Op::Eq => value.eq_ignore_ascii_case(&cond.value),
        Op::Ne => !value.eq_ignore_ascii_case(&cond.value),
        Op::Like => {
            let needle = cond.value.replace('%', "");
            value.to_lowercase().contains(&needle.to_lowercase())
        }
        Op::Gt | Op::Ge | Op::Lt | Op::Le => compare_ordered(value, &cond.value, cond.op),
    }
}

fn compare_ordered(lhs: &str, rhs: &str, op: Op) -> bool {
    let ordering = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(lhs.cmp(rhs)),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        Op::Gt => ordering.is_gt(),
        Op::Ge => ordering.is_ge(),
        Op::Lt => ordering.is_lt(),
        Op::Le => ordering.is_le(),
        Op::Eq | Op::Ne | Op::Like => unreachable!("handled in matches_one"),
    }
}

/// Returns `true` iff `item` satisfies every (AND-joined) condition.
pub fn matches<T: Filterable>(item: &T, conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .all(|c| matches_one(&item.field_value(&c.field), c))
}

/// Filters `items` in place order, returning only entries matching all
/// conditions. Empty `conditions` returns every item.
pub fn apply_filter<'a, T: Filterable>(items: &'a [T], conditions: &[Condition]) -> Vec<&'a T> {
    items.iter().filter(|item| matches(*item, conditions)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_filter;

    struct Server {
        name: &'static str,
        transport: &'static str,
    }

    impl Filterable for Server {
        fn field_value(&self, field: &str) -> String {
            match field {
                "name" => self.name.to_owned(),
                "transportType" => self.transport.to_owned(),
                _ => String::new(),
            }
        }
    }

    #[test]
    fn filters_exact_matches_case_insensitively() {
        let servers = vec![
            Server { name: "a", transport: "stdio" },
            Server { name: "b", transport: "http" },
            Server { name: "c", transport: "HTTP" },
        ];
        let conds = parse_filter("transportType='http'").unwrap();
        let out = apply_filter(&servers, &conds);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn unknown_field_matches_empty_string() {
        let servers = vec![Server { name: "a", transport: "stdio" }];
        let conds = parse_filter("bogus=''").unwrap();
        assert_eq!(apply_filter(&servers, &conds).len(), 1);
    }
}
