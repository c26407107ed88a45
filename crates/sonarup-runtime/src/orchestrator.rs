//! The provisioning workflow as an explicit state machine.
//!
//! Full mode walks `Init → ManifestGenerated → ServicesUp → GateReady →
//! ProfileReady → ProjectReady → TokenReady → Configured → Analyzed`;
//! re-analysis walks `Init → TokenLoaded → Configured → Analyzed`. The project
//! directory is checked before anything else happens. Any failure
//! moves to `Aborting`. Both paths end in `CleanedUp`, which runs exactly once
//! per [`Orchestrator::run`].

use crate::api::QualityServer;
use crate::build::{BuildTool, BuildTrigger};
use crate::cancel::CancellationToken;
use crate::compose::ContainerRuntime;
use crate::config::Settings;
use crate::descriptor::{AnalysisConfig, ComposeManifest};
use crate::executor::Executor;
use crate::opener::UrlOpener;
use crate::poll::wait_until;
use crate::progress::ProgressReporter;
use crate::reconcile::{Reconciled, Reconciler};
use crate::token::{TokenManager, TokenStore};
use crate::workspace::Artifacts;
use crate::{Error, Result};
use sonarup_types::{Credential, FullRun, ReanalysisRun, RunConfig, RunMode};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Init,
    ManifestGenerated,
    ServicesUp,
    GateReady,
    ProfileReady,
    ProjectReady,
    TokenReady,
    TokenLoaded,
    Configured,
    Analyzed,
    Aborting,
    CleanedUp,
}

impl RunState {
    /// Forward transitions. `Aborting` is additionally reachable from every
    /// state that has not started cleanup.
    pub fn valid_transitions(&self) -> &'static [RunState] {
        use RunState::*;
        match self {
            Init => &[ManifestGenerated, TokenLoaded],
            ManifestGenerated => &[ServicesUp],
            ServicesUp => &[GateReady],
            GateReady => &[ProfileReady],
            ProfileReady => &[ProjectReady],
            ProjectReady => &[TokenReady],
            TokenReady | TokenLoaded => &[Configured],
            Configured => &[Analyzed],
            Analyzed | Aborting => &[CleanedUp],
            CleanedUp => &[],
        }
    }

    pub fn can_transition_to(&self, target: RunState) -> bool {
        if target == RunState::Aborting {
            return !matches!(self, RunState::Aborting | RunState::CleanedUp);
        }
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::CleanedUp)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A unit of user-visible work inside one state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    GenerateManifest,
    StartServices,
    AwaitServer,
    QualityGate,
    QualityProfile,
    Project,
    GenerateToken,
    LoadToken,
    ValidateToken,
    LookupProject,
    WriteConfig,
    Analyze,
    OpenDashboard,
}

impl Step {
    /// Stable identifier, also the progress indicator key.
    pub fn id(&self) -> &'static str {
        match self {
            Step::GenerateManifest => "manifest",
            Step::StartServices => "services",
            Step::AwaitServer => "readiness",
            Step::QualityGate => "quality-gate",
            Step::QualityProfile => "quality-profile",
            Step::Project => "project",
            Step::GenerateToken => "token-generate",
            Step::LoadToken => "token-load",
            Step::ValidateToken => "token-validate",
            Step::LookupProject => "project-lookup",
            Step::WriteConfig => "analysis-config",
            Step::Analyze => "analyze",
            Step::OpenDashboard => "dashboard",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Step::GenerateManifest => "Generating service manifest",
            Step::StartServices => "Starting services",
            Step::AwaitServer => "Waiting for the analysis server",
            Step::QualityGate => "Reconciling quality gate",
            Step::QualityProfile => "Reconciling quality profile",
            Step::Project => "Creating project",
            Step::GenerateToken => "Generating analysis token",
            Step::LoadToken => "Loading analysis token",
            Step::ValidateToken => "Validating analysis token",
            Step::LookupProject => "Looking up project",
            Step::WriteConfig => "Writing analysis configuration",
            Step::Analyze => "Running build and analysis",
            Step::OpenDashboard => "Opening dashboard",
        }
    }

    /// Steps whose own output goes to the terminal get no spinner.
    fn shows_progress(&self) -> bool {
        !matches!(self, Step::Analyze | Step::OpenDashboard)
    }
}

/// What a completed step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDetail {
    Done,
    Reconciled(Reconciled),
    Wrote(PathBuf),
    Opened(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Started(Step),
    Completed(Step, StepDetail),
    Failed(Step, String),
    StateChanged { from: RunState, to: RunState },
    CleanedUp { removed: Vec<PathBuf> },
}

/// External systems the workflow drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub server: &'a dyn QualityServer,
    pub containers: &'a dyn ContainerRuntime,
    pub build: &'a dyn BuildTool,
    pub opener: &'a dyn UrlOpener,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: RunMode,
    pub project_key: String,
    pub project_name: String,
    pub dashboard_url: Option<String>,
    pub quality_gate: Option<Reconciled>,
    pub quality_profile: Option<Reconciled>,
    pub token_path: Option<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl RunSummary {
    fn new(config: &RunConfig) -> Self {
        Self {
            mode: config.mode(),
            project_key: config.project_key().unwrap_or_default().to_string(),
            project_name: config.project_name().to_string(),
            dashboard_url: None,
            quality_gate: None,
            quality_profile: None,
            token_path: None,
            removed: Vec::new(),
        }
    }
}

type Observer<'o> = &'o mut dyn FnMut(StepEvent);

pub struct Orchestrator<'a> {
    settings: &'a Settings,
    config: &'a RunConfig,
    deps: Collaborators<'a>,
    exec: Executor,
    progress: ProgressReporter,
    artifacts: Artifacts,
    state: RunState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        settings: &'a Settings,
        config: &'a RunConfig,
        deps: Collaborators<'a>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            config,
            deps,
            progress: ProgressReporter::new(cancel.clone()),
            exec: Executor::new(cancel),
            artifacts: Artifacts::new(),
            state: RunState::Init,
        }
    }

    /// Replace the terminal progress reporter, e.g. with a hidden one.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Drive the configured workflow to completion or abort. Cleanup runs on
    /// both paths before this returns.
    pub fn run<F>(&mut self, mut on_event: F) -> Result<RunSummary>
    where
        F: FnMut(StepEvent),
    {
        if self.state != RunState::Init {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: RunState::Init,
            });
        }

        let config = self.config;
        let outcome = match config {
            RunConfig::Full(run) => self.run_full(run, &mut on_event),
            RunConfig::Reanalyze(run) => self.run_reanalysis(run, &mut on_event),
        };

        match outcome {
            Ok(mut summary) => {
                summary.removed = self.cleanup();
                on_event(StepEvent::CleanedUp {
                    removed: summary.removed.clone(),
                });
                self.transition(RunState::CleanedUp, &mut on_event)?;
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(state = %self.state, error = %err, "run aborted");
                if self.state.can_transition_to(RunState::Aborting) {
                    self.transition(RunState::Aborting, &mut on_event)?;
                }
                let removed = self.cleanup();
                on_event(StepEvent::CleanedUp { removed });
                if self.state.can_transition_to(RunState::CleanedUp) {
                    self.transition(RunState::CleanedUp, &mut on_event)?;
                }
                Err(err)
            }
        }
    }

    /// Stop every progress indicator and remove the files this run generated.
    /// Safe to call any number of times.
    pub fn cleanup(&self) -> Vec<PathBuf> {
        self.progress.stop_all();
        self.artifacts.cleanup()
    }

    fn run_full(&mut self, run: &FullRun, on_event: Observer<'_>) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.config);
        let settings = self.settings;
        require_directory(&run.directory)?;

        let manifest = self.step(Step::GenerateManifest, on_event, |this| {
            let path = settings.paths.manifest.clone();
            this.artifacts.claim(&path)?;
            ComposeManifest::from_settings(&settings.compose).write(&path)?;
            Ok((path.clone(), StepDetail::Wrote(path)))
        })?;
        self.transition(RunState::ManifestGenerated, on_event)?;

        self.step(Step::StartServices, on_event, |this| {
            this.exec.execute("Failed to start services", || {
                this.deps.containers.apply(&manifest)
            })?;
            Ok(((), StepDetail::Done))
        })?;
        self.step(Step::AwaitServer, on_event, |this| {
            this.await_server()?;
            Ok(((), StepDetail::Done))
        })?;
        self.transition(RunState::ServicesUp, on_event)?;

        let quality = &settings.quality;
        let gate = self.step(Step::QualityGate, on_event, |this| {
            let outcome = this.reconciler().reconcile_quality_gate(&quality.gate_name)?;
            Ok((outcome, StepDetail::Reconciled(outcome)))
        })?;
        summary.quality_gate = Some(gate);
        self.transition(RunState::GateReady, on_event)?;

        let profile = self.step(Step::QualityProfile, on_event, |this| {
            let outcome = this
                .reconciler()
                .reconcile_quality_profile(&quality.profile_name, &quality.language)?;
            Ok((outcome, StepDetail::Reconciled(outcome)))
        })?;
        summary.quality_profile = Some(profile);
        self.transition(RunState::ProfileReady, on_event)?;

        self.step(Step::Project, on_event, |this| {
            let outcome = this.reconciler().reconcile_project(
                &run.project_key,
                &run.project_name,
                &run.main_branch,
            )?;
            Ok(((), StepDetail::Reconciled(outcome)))
        })?;
        self.transition(RunState::ProjectReady, on_event)?;

        let store = TokenStore::new(&settings.paths.token_dir);
        let (credential, token_path) = self.step(Step::GenerateToken, on_event, |this| {
            let (credential, path) = this.tokens(&store).generate(
                &run.project_key,
                &run.project_name,
                &run.analyze,
            )?;
            Ok(((credential, path.clone()), StepDetail::Wrote(path)))
        })?;
        summary.token_path = Some(token_path);
        self.step(Step::ValidateToken, on_event, |this| {
            this.tokens(&store).validate(&run.project_name, &credential)?;
            Ok(((), StepDetail::Done))
        })?;
        self.transition(RunState::TokenReady, on_event)?;

        self.configure_and_analyze(&run.project_key, &run.directory, &credential, on_event)?;

        let url = settings.server.dashboard_url(&run.project_key);
        self.checkpoint()?;
        self.deps.opener.open(&url);
        on_event(StepEvent::Completed(
            Step::OpenDashboard,
            StepDetail::Opened(url.clone()),
        ));
        summary.dashboard_url = Some(url);

        Ok(summary)
    }

    fn run_reanalysis(&mut self, run: &ReanalysisRun, on_event: Observer<'_>) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.config);
        require_directory(&run.directory)?;
        let store = TokenStore::new(&self.settings.paths.token_dir);

        let credential = self.step(Step::LoadToken, on_event, |this| {
            let credential = this.tokens(&store).load(&run.project_name)?;
            Ok((credential, StepDetail::Wrote(store.path_for(&run.project_name))))
        })?;
        summary.token_path = Some(store.path_for(&run.project_name));
        self.step(Step::ValidateToken, on_event, |this| {
            this.tokens(&store).validate(&run.project_name, &credential)?;
            Ok(((), StepDetail::Done))
        })?;
        // The persisted token is scoped to the key chosen at provisioning time.
        let project = self.step(Step::LookupProject, on_event, |this| {
            let project = this.reconciler().lookup_project(&run.project_name)?;
            Ok((project, StepDetail::Done))
        })?;
        summary.project_key = project.key.clone();
        self.transition(RunState::TokenLoaded, on_event)?;

        self.configure_and_analyze(&project.key, &run.directory, &credential, on_event)?;
        Ok(summary)
    }

    fn configure_and_analyze(
        &mut self,
        project_key: &str,
        directory: &Path,
        credential: &Credential,
        on_event: Observer<'_>,
    ) -> Result<()> {
        let settings = self.settings;
        let config = self.config;
        let project_name = config.project_name();

        self.step(Step::WriteConfig, on_event, |this| {
            require_directory(directory)?;
            let path = directory.join(&settings.paths.properties_file);
            this.artifacts.claim(&path)?;
            AnalysisConfig::maven(
                project_key,
                project_name,
                &settings.server.url,
                credential,
                &settings.quality.language,
                &settings.quality.gate_name,
                &settings.quality.profile_name,
            )
            .write(&path)?;
            Ok(((), StepDetail::Wrote(path)))
        })?;
        self.transition(RunState::Configured, on_event)?;

        self.step(Step::Analyze, on_event, |this| {
            BuildTrigger::new(this.deps.build, &this.exec).run(
                directory,
                project_key,
                project_name,
                &settings.server.url,
                credential,
            )?;
            Ok(((), StepDetail::Done))
        })?;
        self.transition(RunState::Analyzed, on_event)
    }

    /// Poll the status endpoint until the server reports `UP`. Failed probes
    /// count as "not yet"; only cancellation ends the wait early.
    fn await_server(&self) -> Result<()> {
        let server = self.deps.server;
        wait_until(
            self.exec.cancellation(),
            self.settings.timing.readiness(),
            "the analysis server to report UP",
            || match self
                .exec
                .execute("Failed to query server status", || server.status())
            {
                Ok(status) => Ok(status.is_up()),
                Err(Error::Cancelled) => Err(Error::Cancelled),
                Err(err) => {
                    tracing::debug!(error = %err, "server not reachable yet");
                    Ok(false)
                }
            },
        )
    }

    fn step<T, F>(&mut self, step: Step, on_event: Observer<'_>, body: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<(T, StepDetail)>,
    {
        self.checkpoint()?;
        on_event(StepEvent::Started(step));
        if step.shows_progress() {
            self.progress.start(step.id(), step.label());
        }

        let result = body(self);
        self.progress.stop(step.id());

        match result {
            Ok((value, detail)) => {
                on_event(StepEvent::Completed(step, detail));
                Ok(value)
            }
            Err(err) => {
                on_event(StepEvent::Failed(step, err.to_string()));
                Err(err)
            }
        }
    }

    fn transition(&mut self, to: RunState, on_event: Observer<'_>) -> Result<()> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { from, to });
        }
        tracing::debug!(%from, %to, "state transition");
        self.state = to;
        on_event(StepEvent::StateChanged { from, to });
        Ok(())
    }

    fn checkpoint(&self) -> Result<()> {
        if self.exec.cancellation().is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.deps.server, &self.exec, self.settings.timing.settle())
    }

    fn tokens<'s>(&'s self, store: &'s TokenStore) -> TokenManager<'s> {
        TokenManager::new(
            self.deps.server,
            &self.exec,
            store,
            &self.settings.server.admin_login,
        )
    }
}

fn require_directory(directory: &Path) -> Result<()> {
    if !directory.is_dir() {
        return Err(Error::DirectoryMissing(directory.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CHAIN: [RunState; 10] = [
        RunState::Init,
        RunState::ManifestGenerated,
        RunState::ServicesUp,
        RunState::GateReady,
        RunState::ProfileReady,
        RunState::ProjectReady,
        RunState::TokenReady,
        RunState::Configured,
        RunState::Analyzed,
        RunState::CleanedUp,
    ];

    #[test]
    fn test_full_chain_is_allowed() {
        for pair in FULL_CHAIN.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_reanalysis_chain_is_allowed() {
        let chain = [
            RunState::Init,
            RunState::TokenLoaded,
            RunState::Configured,
            RunState::Analyzed,
            RunState::CleanedUp,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]));
        }
    }

    #[test]
    fn test_skipping_steps_is_rejected() {
        assert!(!RunState::Init.can_transition_to(RunState::ServicesUp));
        assert!(!RunState::ServicesUp.can_transition_to(RunState::ProjectReady));
        assert!(!RunState::TokenLoaded.can_transition_to(RunState::Analyzed));
        assert!(!RunState::Init.can_transition_to(RunState::CleanedUp));
    }

    #[test]
    fn test_abort_reachable_until_cleanup() {
        for state in FULL_CHAIN.iter().take(FULL_CHAIN.len() - 1) {
            assert!(state.can_transition_to(RunState::Aborting));
        }
        assert!(!RunState::Aborting.can_transition_to(RunState::Aborting));
        assert!(!RunState::CleanedUp.can_transition_to(RunState::Aborting));
        assert!(RunState::Aborting.can_transition_to(RunState::CleanedUp));
        assert!(RunState::CleanedUp.is_terminal());
    }

    #[test]
    fn test_step_ids_are_unique() {
        let steps = [
            Step::GenerateManifest,
            Step::StartServices,
            Step::AwaitServer,
            Step::QualityGate,
            Step::QualityProfile,
            Step::Project,
            Step::GenerateToken,
            Step::LoadToken,
            Step::ValidateToken,
            Step::LookupProject,
            Step::WriteConfig,
            Step::Analyze,
            Step::OpenDashboard,
        ];
        let ids: std::collections::HashSet<_> = steps.iter().map(Step::id).collect();
        assert_eq!(ids.len(), steps.len());
    }
}
