//! `AuditEvent` (spec.md §3): append-only, deleted only by retention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Denied,
    Failure,
}

impl Outcome {
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            403 => Self::Denied,
            _ => Self::Failure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub namespace: String,
    pub correlation_id: String,
    pub event_type: String,
    pub actor: String,
    pub request_id: String,
    pub plugin: Option<String>,
    pub resource_type: Option<String>,
    pub resource_ids: Vec<String>,
    pub action: String,
    pub action_verb: Option<String>,
    pub outcome: Outcome,
    pub status_code: u16,
    pub reason: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_status_follows_2xx_403_rest() {
        assert_eq!(Outcome::from_status(204), Outcome::Success);
        assert_eq!(Outcome::from_status(403), Outcome::Denied);
        assert_eq!(Outcome::from_status(500), Outcome::Failure);
        assert_eq!(Outcome::from_status(404), Outcome::Failure);
    }
}
