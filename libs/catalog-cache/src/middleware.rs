//! Response cache middleware (spec.md §4.5): wraps `/api/plugins` and
//! `/api/plugins/{name}/capabilities`, setting `X-Cache: HIT`/`MISS`.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::HeaderValue;
use http_body_util::BodyExt;

use crate::cache::{CacheBucket, CachedResponse, ResponseCache};

fn bucket_for(path: &str) -> Option<CacheBucket> {
    if path == "/api/plugins" {
        Some(CacheBucket::Discovery)
    } else if path.starts_with("/api/plugins/") && path.ends_with("/capabilities") {
        Some(CacheBucket::Capabilities)
    } else {
        None
    }
}

fn cache_key(bucket: CacheBucket, path: &str) -> String {
    match bucket {
        CacheBucket::Discovery => "all".to_owned(),
        CacheBucket::Capabilities => path
            .trim_start_matches("/api/plugins/")
            .trim_end_matches("/capabilities")
            .to_owned(),
    }
}

pub async fn cache_layer(State(cache): State<ResponseCache>, req: Request, next: Next) -> Response {
    let Some(bucket) = bucket_for(req.uri().path()) else {
        return next.run(req).await;
    };
    let key = cache_key(bucket, req.uri().path());

    if let Some(cached) = cache.get(bucket, &key).await {
        let mut response = (cached.status, cached.body).into_response();
        *response.headers_mut() = cached.headers;
        response
            .headers_mut()
            .insert("X-Cache", HeaderValue::from_static("HIT"));
        return response;
    }

    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    cache
        .put(
            bucket,
            key,
            CachedResponse {
                status: parts.status,
                headers: parts.headers.clone(),
                body: bytes.clone(),
            },
        )
        .await;

    parts
        .headers
        .insert("X-Cache", HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_only_the_two_allowed_endpoints() {
        assert_eq!(bucket_for("/api/plugins"), Some(CacheBucket::Discovery));
        assert_eq!(
            bucket_for("/api/plugins/model-catalog/capabilities"),
            Some(CacheBucket::Capabilities)
        );
        assert_eq!(bucket_for("/api/model_catalog/v1alpha1/models"), None);
    }

    #[test]
    fn capability_cache_key_is_the_plugin_name() {
        let key = cache_key(CacheBucket::Capabilities, "/api/plugins/model-catalog/capabilities");
        assert_eq!(key, "model-catalog");
    }
}
