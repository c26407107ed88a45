//! Remote API surface of the analysis server.
//!
//! [`QualityServer`] is the seam between the workflow and the network: the
//! production implementation speaks HTTP, tests substitute an in-memory store.
//! Existence queries return [`Presence`] so callers branch on a typed result
//! rather than on response text.

mod http;
mod wire;

pub use http::HttpQualityServer;

use sonarup_types::{
    Credential, GateCondition, Presence, Project, QualityGate, QualityProfile, ServerStatus,
};
use std::fmt;

/// Result of a single outbound call.
pub type CallResult<T> = std::result::Result<T, CallError>;

/// Failure of a single outbound call, before the executor attaches context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    /// HTTP status or process exit code, when one was received.
    pub status: Option<i32>,
    pub message: String,
}

impl CallError {
    pub fn new(status: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CallError {}

/// Parameters for minting a project analysis token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub login: String,
    pub token_name: String,
    pub project_key: String,
}

pub trait QualityServer {
    fn status(&self) -> CallResult<ServerStatus>;

    fn find_project(&self, name: &str) -> CallResult<Presence<Project>>;
    fn create_project(&self, key: &str, name: &str, main_branch: &str) -> CallResult<()>;

    fn find_quality_gate(&self, name: &str) -> CallResult<Presence<QualityGate>>;
    fn create_quality_gate(&self, name: &str) -> CallResult<()>;
    fn set_default_quality_gate(&self, name: &str) -> CallResult<()>;
    fn gate_conditions(&self, gate: &str) -> CallResult<Vec<GateCondition>>;
    fn update_gate_condition(&self, condition: &GateCondition) -> CallResult<()>;

    fn find_quality_profile(
        &self,
        name: &str,
        language: &str,
    ) -> CallResult<Presence<QualityProfile>>;
    /// Restore a profile from a backup document.
    fn restore_quality_profile(&self, backup: &str) -> CallResult<()>;
    fn set_default_quality_profile(&self, name: &str, language: &str) -> CallResult<()>;

    /// Mint a token and return its raw value, which may be empty if the
    /// server response carried none.
    fn generate_token(&self, request: &TokenRequest) -> CallResult<String>;
    fn validate_token(&self, credential: &Credential) -> CallResult<bool>;
}
