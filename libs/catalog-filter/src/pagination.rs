//! Shared pagination and deterministic ordering, mirroring spec.md §4.9's
//! `ParsePaginationParams` + page-token contract.

use base64::Engine;
use catalog_errors::CatalogError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn from_str(s: &str) -> Result<Self, CatalogError> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(CatalogError::bad_request(format!(
                "invalid sortOrder '{other}', expected ASC or DESC"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationParams {
    pub page_size: u32,
    pub page_token: Option<String>,
    pub order_by: Option<String>,
    pub sort_order: SortOrder,
}

/// Parses raw query-string pagination fields, clamping `pageSize` to
/// `[1, 100]` (default 20) and defaulting `sortOrder` to ASC.
///
/// # Errors
/// Returns `CatalogError::BadRequest` for an unparsable `sortOrder`.
pub fn parse_pagination_params(
    page_size: Option<u32>,
    page_token: Option<String>,
    order_by: Option<String>,
    sort_order: Option<String>,
) -> Result<PaginationParams, CatalogError> {
    let page_size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let sort_order = match sort_order {
        Some(s) => SortOrder::from_str(&s)?,
        None => SortOrder::Asc,
    };
    Ok(PaginationParams {
        page_size,
        page_token,
        order_by,
        sort_order,
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct PageToken {
    last_key: String,
    id: String,
}

fn encode_token(last_key: &str, id: &str) -> String {
    let json = serde_json::to_vec(&PageToken {
        last_key: last_key.to_owned(),
        id: id.to_owned(),
    })
    .unwrap_or_default();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
}

fn decode_token(token: &str) -> Result<PageToken, CatalogError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| CatalogError::bad_request("malformed pageToken"))?;
    serde_json::from_slice(&bytes).map_err(|_| CatalogError::bad_request("malformed pageToken"))
}

/// Sorts `items` by `key_fn` (ties broken by `name_fn`), applies the
/// `page_token` cursor, then truncates to `page_size`. Returns the page
/// plus a `nextPageToken` when more items remain.
///
/// # Errors
/// Returns `CatalogError::BadRequest` for a malformed `page_token`.
pub fn paginate<'a, T>(
    mut items: Vec<&'a T>,
    params: &PaginationParams,
    key_fn: impl Fn(&T) -> String,
    name_fn: impl Fn(&T) -> String,
) -> Result<(Vec<&'a T>, Option<String>), CatalogError> {
    items.sort_by(|a, b| {
        let ord = key_fn(a).cmp(&key_fn(b)).then_with(|| name_fn(a).cmp(&name_fn(b)));
        match params.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    let start = if let Some(token) = &params.page_token {
        let cursor = decode_token(token)?;
        items
            .iter()
            .position(|item| {
                let after = match params.sort_order {
                    SortOrder::Asc => {
                        (key_fn(item), name_fn(item)) > (cursor.last_key.clone(), cursor.id.clone())
                    }
                    SortOrder::Desc => {
                        (key_fn(item), name_fn(item)) < (cursor.last_key.clone(), cursor.id.clone())
                    }
                };
                after
            })
            .unwrap_or(items.len())
    } else {
        0
    };

    let page_size = params.page_size as usize;
    let page: Vec<&T> = items[start..].iter().take(page_size).copied().collect();
    let next_token = if start + page.len() < items.len() {
        page.last()
            .map(|last| encode_token(&key_fn(last), &name_fn(last)))
    } else {
        None
    };

    Ok((page, next_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item {
        key: &'static str,
        name: &'static str,
    }

    #[test]
    fn clamps_page_size() {
        let p = parse_pagination_params(Some(500), None, None, None).unwrap();
        assert_eq!(p.page_size, MAX_PAGE_SIZE);
        let p = parse_pagination_params(Some(0), None, None, None).unwrap();
        assert_eq!(p.page_size, 1);
    }

    #[test]
    fn roundtrips_all_elements_across_pages() {
        let items = vec![
            Item { key: "b", name: "n1" },
            Item { key: "a", name: "n2" },
            Item { key: "a", name: "n1" },
            Item { key: "c", name: "n1" },
        ];
        let refs: Vec<&Item> = items.iter().collect();
        let params = PaginationParams {
            page_size: 2,
            page_token: None,
            order_by: None,
            sort_order: SortOrder::Asc,
        };
        let mut seen = Vec::new();
        let (page1, tok1) = paginate(refs.clone(), &params, |i| i.key.to_owned(), |i| i.name.to_owned()).unwrap();
        seen.extend(page1.iter().map(|i| (i.key, i.name)));
        let params2 = PaginationParams { page_token: tok1, ..params };
        let (page2, tok2) = paginate(refs, &params2, |i| i.key.to_owned(), |i| i.name.to_owned()).unwrap();
        seen.extend(page2.iter().map(|i| (i.key, i.name)));
        assert!(tok2.is_none());
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], ("a", "n1"));
        assert_eq!(seen[1], ("a", "n2"));
    }

    #[test]
    fn rejects_malformed_token() {
        let params = PaginationParams {
            page_size: 10,
            page_token: Some("not-base64-json!!".to_owned()),
            order_by: None,
            sort_order: SortOrder::Asc,
        };
        let items: Vec<&Item> = Vec::new();
        assert!(paginate(items, &params, |i: &Item| i.key.to_owned(), |i: &Item| i.name.to_owned()).is_err());
    }
}
