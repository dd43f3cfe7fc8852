//! RFC 9457 Problem Details, independent of any particular error kind.

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

/// RFC 9457 Problem Details body shared by every handler error path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status: StatusCode,
    pub detail: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    /// Also carried as `error`/`message` for callers that expect the flatter
    /// `{error, message}` envelope spec.md uses for 403 bodies.
    #[serde(skip)]
    pub short_error: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            type_url: "about:blank".to_owned(),
            short_error: title.to_lowercase().replace(' ', "-"),
            title,
            status,
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
        }
    }

    #[must_use]
    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}

impl axum::response::IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        use axum::http::HeaderValue;

        let status = self.status;
        // spec.md's forbidden envelope is {error, message}; everything else
        // uses the full problem-details body. Keep both representations
        // trivially derivable from the same struct.
        let body = serde_json::json!({
            "type": self.type_url,
            "title": self.title,
            "status": status.as_u16(),
            "detail": self.detail,
            "instance": self.instance,
            "code": self.code,
            "error": self.short_error,
            "message": self.detail,
        });
        let mut resp = axum::Json(body).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_status_as_u16() {
        let p = Problem::new(StatusCode::NOT_FOUND, "Not Found", "no such plugin");
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"status\":404"));
    }
}
