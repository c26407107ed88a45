//! Response payloads, kept private to the HTTP client.

use serde::Deserialize;
use sonarup_types::{GateCondition, Project, QualityGate, QualityProfile, ServerStatus};

#[derive(Debug, Deserialize)]
pub(super) struct StatusResponse {
    pub status: ServerStatus,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProjectSearchResponse {
    #[serde(default)]
    pub components: Vec<Project>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GateListResponse {
    #[serde(default)]
    pub qualitygates: Vec<QualityGate>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GateShowResponse {
    #[serde(default)]
    pub conditions: Vec<ConditionPayload>,
}

/// Older servers number conditions, newer ones use opaque string ids.
#[derive(Debug, Deserialize)]
pub(super) struct ConditionPayload {
    pub id: serde_json::Value,
    pub metric: String,
    pub op: String,
    #[serde(default)]
    pub error: String,
}

impl ConditionPayload {
    pub fn into_condition(self) -> Option<GateCondition> {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(GateCondition {
            id,
            metric: self.metric,
            op: self.op,
            error: self.error,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProfileSearchResponse {
    #[serde(default)]
    pub profiles: Vec<QualityProfile>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ValidateResponse {
    #[serde(default)]
    pub valid: bool,
}
