//! Stand-ins for the container runtime, build tool and browser.

use sonarup_runtime::{
    BuildOutcome, BuildRequest, BuildTool, CallError, CallResult, CancellationToken,
    ContainerRuntime, UrlOpener,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records each manifest it is asked to apply, with its content at that
/// moment.
#[derive(Default)]
pub struct FakeContainerRuntime {
    applied: Mutex<Vec<(PathBuf, String)>>,
    failure: Option<CallError>,
    cancel: Option<CancellationToken>,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: i32, message: &str) -> Self {
        Self {
            failure: Some(CallError::new(Some(status), message)),
            ..Self::default()
        }
    }

    /// Cancel the run once services are applied.
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..Self::default()
        }
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().map(|a| a.len()).unwrap_or_default()
    }

    pub fn applied(&self) -> Vec<(PathBuf, String)> {
        self.applied.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl ContainerRuntime for FakeContainerRuntime {
    fn apply(&self, manifest: &Path) -> CallResult<()> {
        let content = std::fs::read_to_string(manifest)
            .map_err(|err| CallError::new(Some(1), format!("open {}: {}", manifest.display(), err)))?;
        if let Ok(mut applied) = self.applied.lock() {
            applied.push((manifest.to_path_buf(), content));
        }
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// What the build tool saw when it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCall {
    pub directory: PathBuf,
    pub project_key: String,
    pub project_name: String,
    pub server_url: String,
    pub token: String,
    /// Content of the analysis configuration present in the directory.
    pub analysis_config: Option<String>,
}

pub struct FakeBuildTool {
    exit_code: Option<i32>,
    properties_file: String,
    calls: Mutex<Vec<BuildCall>>,
}

impl Default for FakeBuildTool {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBuildTool {
    /// A build that passes.
    pub fn new() -> Self {
        Self::exiting_with(Some(0))
    }

    /// `None` simulates termination by a signal.
    pub fn exiting_with(code: Option<i32>) -> Self {
        Self {
            exit_code: code,
            properties_file: "sonar-project.properties".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<BuildCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl BuildTool for FakeBuildTool {
    fn run(&self, request: &BuildRequest<'_>) -> CallResult<BuildOutcome> {
        let analysis_config =
            std::fs::read_to_string(request.directory.join(&self.properties_file)).ok();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(BuildCall {
                directory: request.directory.to_path_buf(),
                project_key: request.project_key.to_string(),
                project_name: request.project_name.to_string(),
                server_url: request.server_url.to_string(),
                token: request.credential.expose().to_string(),
                analysis_config,
            });
        }
        Ok(BuildOutcome {
            code: self.exit_code,
        })
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    urls: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) {
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
    }
}
