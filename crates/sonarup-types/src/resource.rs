use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed result of an existence query against the analysis server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence<T> {
    Present(T),
    Absent,
}

impl<T> Presence<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Presence::Present(value) => Some(value),
            Presence::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for Presence<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Presence::Present(v),
            None => Presence::Absent,
        }
    }
}

/// The server-side resource families this tool reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Project,
    QualityGate,
    QualityProfile,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Project => write!(f, "project"),
            ResourceKind::QualityGate => write!(f, "quality gate"),
            ResourceKind::QualityProfile => write!(f, "quality profile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGate {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// One threshold condition attached to a quality gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCondition {
    pub id: String,
    pub metric: String,
    pub op: String,
    pub error: String,
}

/// Threshold a condition should end up with after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionTarget {
    pub metric: &'static str,
    pub op: &'static str,
    pub error: &'static str,
}

/// Fixed thresholds applied to a freshly created gate:
/// coverage on new code below 90% fails, duplication on new code above 1.5% fails.
pub const GATE_CONDITION_TARGETS: [ConditionTarget; 2] = [
    ConditionTarget {
        metric: "new_coverage",
        op: "LT",
        error: "90",
    },
    ConditionTarget {
        metric: "new_duplicated_lines_density",
        op: "GT",
        error: "1.5",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub key: String,
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Server lifecycle status as reported by `/api/system/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    Starting,
    Up,
    Down,
    Restarting,
    DbMigrationNeeded,
    DbMigrationRunning,
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    pub fn is_up(self) -> bool {
        self == ServerStatus::Up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_from_option() {
        let present: Presence<u8> = Some(3).into();
        assert!(present.is_present());
        assert_eq!(present.into_option(), Some(3));

        let absent: Presence<u8> = None.into();
        assert!(!absent.is_present());
    }

    #[test]
    fn test_server_status_unknown_values() {
        let status: ServerStatus = serde_json::from_str("\"UP\"").unwrap();
        assert!(status.is_up());

        let status: ServerStatus = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(status, ServerStatus::Unknown);
    }

    #[test]
    fn test_quality_profile_camel_case() {
        let json = r#"{"key":"AX1","name":"Strict","language":"java","isDefault":true}"#;
        let profile: QualityProfile = serde_json::from_str(json).unwrap();
        assert!(profile.is_default);
        assert_eq!(profile.language, "java");
    }
}
