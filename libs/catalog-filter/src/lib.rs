//! Filter query grammar, pagination and deterministic ordering shared by
//! every catalog plugin's `list` handler.

pub mod apply;
pub mod grammar;
pub mod pagination;

pub use apply::{apply_filter, matches, Filterable};
pub use grammar::{parse_filter, Condition, Op};
pub use pagination::{parse_pagination_params, paginate, PaginationParams, SortOrder};
