//! Tenant resolution, identity extraction and authorization with caching
//! (spec.md §4.1–4.3 / C1–C3).

pub mod authorizer;
pub mod cache;
pub mod identity;
pub mod middleware;
pub mod tenant;

pub use authorizer::{map_request, AuthzRequest, Authorizer, NoopAuthorizer};
pub use cache::CachingAuthorizer;
pub use identity::{extract_identity, Identity};
pub use middleware::{authz_layer, identity_layer, tenant_layer, AuthzState, TenantState};
pub use tenant::{is_valid_dns_label, resolve_tenant, TenancyMode, TenantContext};

#[cfg(feature = "sar")]
pub use authorizer::SarAuthorizer;
