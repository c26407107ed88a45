//! Query-then-create reconciliation of server-side resources.
//!
//! Every procedure first asks the server whether the resource exists and only
//! creates it when the typed answer is [`Presence::Absent`], so repeated runs
//! converge instead of duplicating. Projects are the exception: an existing
//! project of the same name is an operator error and aborts the run.

use crate::api::QualityServer;
use crate::executor::Executor;
use crate::poll::{PollPolicy, wait_until};
use crate::{Error, Result};
use sonarup_types::{GATE_CONDITION_TARGETS, GateCondition, Presence, Project, ResourceKind};

const PROFILE_BACKUP_TEMPLATE: &str = include_str!("../assets/quality-profile.xml");

/// What reconciliation did to reach the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Created,
    AlreadyPresent,
}

pub struct Reconciler<'a> {
    api: &'a dyn QualityServer,
    exec: &'a Executor,
    settle: PollPolicy,
}

impl<'a> Reconciler<'a> {
    /// `settle` bounds the wait for a newly created resource to become
    /// queryable.
    pub fn new(api: &'a dyn QualityServer, exec: &'a Executor, settle: PollPolicy) -> Self {
        Self { api, exec, settle }
    }

    pub fn reconcile_project(&self, key: &str, name: &str, main_branch: &str) -> Result<Reconciled> {
        let existing = self
            .exec
            .execute("Failed to search projects", || self.api.find_project(name))?;

        if let Presence::Present(project) = existing {
            tracing::error!(name, existing_key = %project.key, "project name already taken");
            return Err(Error::ProjectExists {
                name: name.to_string(),
            });
        }

        self.exec.execute("Failed to create project", || {
            self.api.create_project(key, name, main_branch)
        })?;
        self.await_presence(ResourceKind::Project, name, || {
            self.exec
                .execute("Failed to search projects", || self.api.find_project(name))
                .map(|p| p.is_present())
        })?;

        tracing::info!(key, name, "project created");
        Ok(Reconciled::Created)
    }

    /// The existing project named `name`. Re-analysis never creates one.
    pub fn lookup_project(&self, name: &str) -> Result<Project> {
        let existing = self
            .exec
            .execute("Failed to search projects", || self.api.find_project(name))?;

        existing.into_option().ok_or_else(|| Error::ProjectNotFound {
            name: name.to_string(),
        })
    }

    pub fn reconcile_quality_gate(&self, name: &str) -> Result<Reconciled> {
        let existing = self.exec.execute("Failed to look up quality gate", || {
            self.api.find_quality_gate(name)
        })?;

        if existing.is_present() {
            tracing::info!(gate = name, "quality gate already exists, leaving it unchanged");
            return Ok(Reconciled::AlreadyPresent);
        }

        self.exec.execute("Failed to create quality gate", || {
            self.api.create_quality_gate(name)
        })?;
        self.await_presence(ResourceKind::QualityGate, name, || {
            self.exec
                .execute("Failed to look up quality gate", || {
                    self.api.find_quality_gate(name)
                })
                .map(|g| g.is_present())
        })?;
        self.exec.execute("Failed to set default quality gate", || {
            self.api.set_default_quality_gate(name)
        })?;
        self.edit_quality_gate(name)?;

        tracing::info!(gate = name, "quality gate created and set as default");
        Ok(Reconciled::Created)
    }

    /// Tighten the coverage and duplication conditions of `gate`. A gate
    /// without one of those conditions is a hard failure; no update is sent
    /// until every id has been found.
    pub fn edit_quality_gate(&self, gate: &str) -> Result<()> {
        let conditions = self.exec.execute("Failed to read quality gate conditions", || {
            self.api.gate_conditions(gate)
        })?;

        let mut updates = Vec::with_capacity(GATE_CONDITION_TARGETS.len());
        for target in &GATE_CONDITION_TARGETS {
            let current = conditions
                .iter()
                .find(|c| c.metric == target.metric)
                .ok_or_else(|| Error::MissingCondition {
                    gate: gate.to_string(),
                    metric: target.metric.to_string(),
                })?;

            updates.push(GateCondition {
                id: current.id.clone(),
                metric: target.metric.to_string(),
                op: target.op.to_string(),
                error: target.error.to_string(),
            });
        }

        for update in &updates {
            self.exec.execute("Failed to update quality gate condition", || {
                self.api.update_gate_condition(update)
            })?;
            tracing::debug!(gate, metric = %update.metric, op = %update.op, error = %update.error, "condition updated");
        }
        Ok(())
    }

    pub fn reconcile_quality_profile(&self, name: &str, language: &str) -> Result<Reconciled> {
        let existing = self.exec.execute("Failed to search quality profiles", || {
            self.api.find_quality_profile(name, language)
        })?;

        if existing.is_present() {
            tracing::info!(profile = name, language, "quality profile already exists, leaving it unchanged");
            return Ok(Reconciled::AlreadyPresent);
        }

        let backup = render_profile_backup(name, language);
        self.exec.execute("Failed to restore quality profile", || {
            self.api.restore_quality_profile(&backup)
        })?;
        self.await_presence(ResourceKind::QualityProfile, name, || {
            self.exec
                .execute("Failed to search quality profiles", || {
                    self.api.find_quality_profile(name, language)
                })
                .map(|p| p.is_present())
        })?;
        self.exec.execute("Failed to set default quality profile", || {
            self.api.set_default_quality_profile(name, language)
        })?;

        tracing::info!(profile = name, language, "quality profile restored and set as default");
        Ok(Reconciled::Created)
    }

    fn await_presence<F>(&self, kind: ResourceKind, name: &str, probe: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        let what = format!("{} '{}' to become queryable", kind, name);
        wait_until(self.exec.cancellation(), self.settle, &what, probe)
    }
}

/// Fill the bundled backup document with a profile name and language.
pub fn render_profile_backup(name: &str, language: &str) -> String {
    PROFILE_BACKUP_TEMPLATE
        .replace("{{name}}", &xml_escape(name))
        .replace("{{language}}", &xml_escape(language))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_profile_backup() {
        let backup = render_profile_backup("Team <Java>", "java");
        assert!(backup.contains("<name>Team &lt;Java&gt;</name>"));
        assert!(backup.contains("<language>java</language>"));
        assert!(backup.contains("<repositoryKey>java</repositoryKey>"));
        assert!(!backup.contains("{{"));
    }
}
