//! In-memory analysis server.
//!
//! Holds projects, gates, profiles and tokens the way the real server does,
//! records every call in order, and lets tests inject failures.

use sonarup_runtime::{CallError, CallResult, CancellationToken, QualityServer, TokenRequest};
use sonarup_types::{
    Credential, GateCondition, Presence, Project, QualityGate, QualityProfile, ServerStatus,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// One entry of the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Status,
    FindProject,
    CreateProject,
    FindQualityGate,
    CreateQualityGate,
    SetDefaultQualityGate,
    GateConditions,
    UpdateGateCondition,
    FindQualityProfile,
    RestoreQualityProfile,
    SetDefaultQualityProfile,
    GenerateToken,
    ValidateToken,
}

/// Conditions every newly created gate starts with.
const INITIAL_CONDITIONS: [(&str, &str, &str); 3] = [
    ("new_coverage", "LT", "80"),
    ("new_duplicated_lines_density", "GT", "3"),
    ("new_security_hotspots_reviewed", "LT", "100"),
];

#[derive(Default)]
struct State {
    starting_probes: usize,
    query_lag: usize,
    pending_lag: usize,
    projects: Vec<Project>,
    gates: Vec<QualityGate>,
    conditions: HashMap<String, Vec<GateCondition>>,
    omitted_metrics: Vec<String>,
    profiles: Vec<QualityProfile>,
    issued: Vec<TokenRequest>,
    valid_tokens: Vec<String>,
    empty_tokens: bool,
    reject_tokens: bool,
    next_id: usize,
    failures: HashMap<Call, CallError>,
    cancel_on: Option<(Call, CancellationToken)>,
    log: Vec<Call>,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    /// Absent while a freshly created resource is still "settling".
    fn lagging(&mut self) -> bool {
        if self.pending_lag > 0 {
            self.pending_lag -= 1;
            return true;
        }
        false
    }
}

#[derive(Default)]
pub struct MockServer {
    state: Mutex<State>,
}

impl MockServer {
    /// An empty server that reports `UP`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `STARTING` for the first `probes` status calls.
    pub fn starting_for(self, probes: usize) -> Self {
        self.lock().starting_probes = probes;
        self
    }

    /// Hide each newly created resource from the next `queries` lookups.
    pub fn with_query_lag(self, queries: usize) -> Self {
        self.lock().query_lag = queries;
        self
    }

    pub fn with_project(self, key: &str, name: &str) -> Self {
        self.lock().projects.push(Project {
            key: key.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_quality_gate(self, name: &str) -> Self {
        self.lock().gates.push(QualityGate {
            name: name.to_string(),
            is_default: false,
        });
        self
    }

    pub fn with_quality_profile(self, name: &str, language: &str) -> Self {
        {
            let mut state = self.lock();
            let key = state.next_id();
            state.profiles.push(QualityProfile {
                key,
                name: name.to_string(),
                language: language.to_string(),
                is_default: false,
            });
        }
        self
    }

    /// Accept `token` on validation without having issued it.
    pub fn with_valid_token(self, token: &str) -> Self {
        self.lock().valid_tokens.push(token.to_string());
        self
    }

    /// Create gates without a condition on `metric`.
    pub fn omitting_condition(self, metric: &str) -> Self {
        self.lock().omitted_metrics.push(metric.to_string());
        self
    }

    pub fn returning_empty_tokens(self) -> Self {
        self.lock().empty_tokens = true;
        self
    }

    pub fn rejecting_tokens(self) -> Self {
        self.lock().reject_tokens = true;
        self
    }

    pub fn failing_on(self, call: Call, status: i32, message: &str) -> Self {
        self.lock()
            .failures
            .insert(call, CallError::new(Some(status), message));
        self
    }

    /// Set `token` when `call` is issued, as a signal would mid-run.
    pub fn cancelling_on(self, call: Call, token: CancellationToken) -> Self {
        self.lock().cancel_on = Some((call, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().log.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.lock().log.iter().filter(|c| **c == call).count()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    pub fn gates(&self) -> Vec<QualityGate> {
        self.lock().gates.clone()
    }

    pub fn profiles(&self) -> Vec<QualityProfile> {
        self.lock().profiles.clone()
    }

    pub fn conditions(&self, gate: &str) -> Vec<GateCondition> {
        self.lock().conditions.get(gate).cloned().unwrap_or_default()
    }

    pub fn issued_tokens(&self) -> Vec<TokenRequest> {
        self.lock().issued.clone()
    }

    pub fn default_gate(&self) -> Option<String> {
        self.lock()
            .gates
            .iter()
            .find(|g| g.is_default)
            .map(|g| g.name.clone())
    }

    pub fn default_profile(&self, language: &str) -> Option<String> {
        self.lock()
            .profiles
            .iter()
            .find(|p| p.language == language && p.is_default)
            .map(|p| p.name.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log `call`, fire any cancellation hook, and return the injected
    /// failure if there is one.
    fn record(&self, call: Call) -> CallResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.log.push(call);
        if let Some((trigger, token)) = &state.cancel_on
            && *trigger == call
        {
            token.cancel();
        }
        if let Some(err) = state.failures.get(&call).cloned() {
            return Err(err);
        }
        Ok(state)
    }
}

impl QualityServer for MockServer {
    fn status(&self) -> CallResult<ServerStatus> {
        let mut state = self.record(Call::Status)?;
        if state.starting_probes > 0 {
            state.starting_probes -= 1;
            return Ok(ServerStatus::Starting);
        }
        Ok(ServerStatus::Up)
    }

    fn find_project(&self, name: &str) -> CallResult<Presence<Project>> {
        let mut state = self.record(Call::FindProject)?;
        if state.lagging() {
            return Ok(Presence::Absent);
        }
        Ok(state.projects.iter().find(|p| p.name == name).cloned().into())
    }

    fn create_project(&self, key: &str, name: &str, _main_branch: &str) -> CallResult<()> {
        let mut state = self.record(Call::CreateProject)?;
        if state.projects.iter().any(|p| p.key == key) {
            return Err(CallError::new(Some(400), format!("key '{}' already exists", key)));
        }
        state.projects.push(Project {
            key: key.to_string(),
            name: name.to_string(),
        });
        state.pending_lag = state.query_lag;
        Ok(())
    }

    fn find_quality_gate(&self, name: &str) -> CallResult<Presence<QualityGate>> {
        let mut state = self.record(Call::FindQualityGate)?;
        if state.lagging() {
            return Ok(Presence::Absent);
        }
        Ok(state.gates.iter().find(|g| g.name == name).cloned().into())
    }

    fn create_quality_gate(&self, name: &str) -> CallResult<()> {
        let mut state = self.record(Call::CreateQualityGate)?;
        if state.gates.iter().any(|g| g.name == name) {
            return Err(CallError::new(Some(400), "name has already been taken"));
        }
        state.gates.push(QualityGate {
            name: name.to_string(),
            is_default: false,
        });

        let mut conditions = Vec::new();
        for (metric, op, error) in INITIAL_CONDITIONS {
            if state.omitted_metrics.iter().any(|m| m == metric) {
                continue;
            }
            let id = state.next_id();
            conditions.push(GateCondition {
                id,
                metric: metric.to_string(),
                op: op.to_string(),
                error: error.to_string(),
            });
        }
        state.conditions.insert(name.to_string(), conditions);
        state.pending_lag = state.query_lag;
        Ok(())
    }

    fn set_default_quality_gate(&self, name: &str) -> CallResult<()> {
        let mut state = self.record(Call::SetDefaultQualityGate)?;
        if !state.gates.iter().any(|g| g.name == name) {
            return Err(CallError::new(Some(404), "no quality gate with that name"));
        }
        for gate in state.gates.iter_mut() {
            gate.is_default = gate.name == name;
        }
        Ok(())
    }

    fn gate_conditions(&self, gate: &str) -> CallResult<Vec<GateCondition>> {
        let state = self.record(Call::GateConditions)?;
        Ok(state.conditions.get(gate).cloned().unwrap_or_default())
    }

    fn update_gate_condition(&self, condition: &GateCondition) -> CallResult<()> {
        let mut state = self.record(Call::UpdateGateCondition)?;
        let existing = state
            .conditions
            .values_mut()
            .flat_map(|conditions| conditions.iter_mut())
            .find(|c| c.id == condition.id);
        match existing {
            Some(existing) => {
                *existing = condition.clone();
                Ok(())
            }
            None => Err(CallError::new(Some(404), "no condition with that id")),
        }
    }

    fn find_quality_profile(
        &self,
        name: &str,
        language: &str,
    ) -> CallResult<Presence<QualityProfile>> {
        let mut state = self.record(Call::FindQualityProfile)?;
        if state.lagging() {
            return Ok(Presence::Absent);
        }
        Ok(state
            .profiles
            .iter()
            .find(|p| p.name == name && p.language == language)
            .cloned()
            .into())
    }

    fn restore_quality_profile(&self, backup: &str) -> CallResult<()> {
        let mut state = self.record(Call::RestoreQualityProfile)?;
        let (Some(name), Some(language)) = (element(backup, "name"), element(backup, "language"))
        else {
            return Err(CallError::new(Some(400), "backup is missing name or language"));
        };
        let key = state.next_id();
        state.profiles.push(QualityProfile {
            key,
            name,
            language,
            is_default: false,
        });
        state.pending_lag = state.query_lag;
        Ok(())
    }

    fn set_default_quality_profile(&self, name: &str, language: &str) -> CallResult<()> {
        let mut state = self.record(Call::SetDefaultQualityProfile)?;
        if !state
            .profiles
            .iter()
            .any(|p| p.name == name && p.language == language)
        {
            return Err(CallError::new(Some(404), "no quality profile with that name"));
        }
        for profile in state.profiles.iter_mut().filter(|p| p.language == language) {
            profile.is_default = profile.name == name;
        }
        Ok(())
    }

    fn generate_token(&self, request: &TokenRequest) -> CallResult<String> {
        let mut state = self.record(Call::GenerateToken)?;
        state.issued.push(request.clone());
        if state.empty_tokens {
            return Ok(String::new());
        }
        let token = format!("squ_{}_{}", request.token_name, state.issued.len());
        state.valid_tokens.push(token.clone());
        Ok(token)
    }

    fn validate_token(&self, credential: &Credential) -> CallResult<bool> {
        let state = self.record(Call::ValidateToken)?;
        if state.reject_tokens {
            return Ok(false);
        }
        Ok(state.valid_tokens.iter().any(|t| t == credential.expose()))
    }
}

/// Text of the first `<tag>` element, unescaped enough for the bundled
/// backup format.
fn element(document: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = document.find(&open)? + open.len();
    let end = start + document[start..].find(&close)?;
    Some(
        document[start..end]
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}
