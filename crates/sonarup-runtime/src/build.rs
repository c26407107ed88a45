use crate::api::{CallError, CallResult};
use crate::config::BuildSettings;
use crate::executor::Executor;
use crate::{Error, Result};
use sonarup_types::Credential;
use std::path::Path;
use std::process::{Command, Stdio};

/// Everything the build tool needs to analyze a project.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub directory: &'a Path,
    pub project_key: &'a str,
    pub project_name: &'a str,
    pub server_url: &'a str,
    pub credential: &'a Credential,
}

impl BuildRequest<'_> {
    /// `-D` properties identifying the project and server.
    pub fn properties(&self) -> Vec<String> {
        vec![
            format!("-Dsonar.projectKey={}", self.project_key),
            format!("-Dsonar.projectName={}", self.project_name),
            format!("-Dsonar.host.url={}", self.server_url),
            format!("-Dsonar.token={}", self.credential.expose()),
        ]
    }
}

/// Exit status of a finished build. `code` is `None` when the process was
/// killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOutcome {
    pub code: Option<i32>,
}

impl BuildOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait BuildTool {
    /// Run the pipeline. `Err` means the tool could not be launched; a
    /// finished build, passing or failing, is an `Ok` outcome.
    fn run(&self, request: &BuildRequest<'_>) -> CallResult<BuildOutcome>;
}

/// Runs a build program (Maven by default) in the project directory with the
/// configured goals. Its output goes straight to the terminal.
pub struct CommandBuildTool {
    program: String,
    goals: Vec<String>,
}

impl CommandBuildTool {
    pub fn new(program: impl Into<String>, goals: Vec<String>) -> Self {
        Self {
            program: program.into(),
            goals,
        }
    }

    pub fn from_settings(settings: &BuildSettings) -> Self {
        Self::new(&settings.program, settings.goals.clone())
    }
}

impl BuildTool for CommandBuildTool {
    fn run(&self, request: &BuildRequest<'_>) -> CallResult<BuildOutcome> {
        let status = Command::new(&self.program)
            .args(&self.goals)
            .args(request.properties())
            .current_dir(request.directory)
            .stdin(Stdio::null())
            .status()
            .map_err(|err| CallError::transport(format!("{}: {}", self.program, err)))?;

        Ok(BuildOutcome {
            code: status.code(),
        })
    }
}

/// Invokes the build tool for one project and turns its exit status into a
/// workflow result.
pub struct BuildTrigger<'a> {
    tool: &'a dyn BuildTool,
    exec: &'a Executor,
}

impl<'a> BuildTrigger<'a> {
    pub fn new(tool: &'a dyn BuildTool, exec: &'a Executor) -> Self {
        Self { tool, exec }
    }

    pub fn run(
        &self,
        directory: &Path,
        project_key: &str,
        project_name: &str,
        server_url: &str,
        credential: &Credential,
    ) -> Result<()> {
        if !directory.is_dir() {
            return Err(Error::DirectoryMissing(directory.to_path_buf()));
        }

        let request = BuildRequest {
            directory,
            project_key,
            project_name,
            server_url,
            credential,
        };

        let outcome = self
            .exec
            .execute("Failed to launch the build tool", || self.tool.run(&request))?;

        // An interrupt reaches the child too; report it as one, not as a
        // failed build.
        if self.exec.cancellation().is_cancelled() {
            return Err(Error::Cancelled);
        }

        if outcome.success() {
            tracing::info!(project = project_key, "analysis finished");
            Ok(())
        } else {
            Err(Error::BuildFailed { code: outcome.code })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use tempfile::TempDir;

    struct FixedOutcome(Option<i32>);

    impl BuildTool for FixedOutcome {
        fn run(&self, _request: &BuildRequest<'_>) -> CallResult<BuildOutcome> {
            Ok(BuildOutcome { code: self.0 })
        }
    }

    /// A build interrupted by the same signal that cancelled the run.
    struct Interrupted(CancellationToken);

    impl BuildTool for Interrupted {
        fn run(&self, _request: &BuildRequest<'_>) -> CallResult<BuildOutcome> {
            self.0.cancel();
            Ok(BuildOutcome { code: Some(130) })
        }
    }

    fn credential() -> Credential {
        Credential::new("squ_1").unwrap()
    }

    #[test]
    fn test_properties_include_token() {
        let credential = credential();
        let request = BuildRequest {
            directory: Path::new("."),
            project_key: "k",
            project_name: "n",
            server_url: "http://localhost:9000",
            credential: &credential,
        };
        let props = request.properties();
        assert!(props.contains(&"-Dsonar.projectKey=k".to_string()));
        assert!(props.contains(&"-Dsonar.token=squ_1".to_string()));
    }

    #[test]
    fn test_failing_build_propagates_code() {
        let dir = TempDir::new().unwrap();
        let exec = Executor::new(CancellationToken::new());
        let tool = FixedOutcome(Some(2));
        let trigger = BuildTrigger::new(&tool, &exec);

        let err = trigger
            .run(dir.path(), "k", "n", "http://x", &credential())
            .unwrap_err();
        assert!(matches!(err, Error::BuildFailed { code: Some(2) }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_interrupted_build_is_cancellation() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let exec = Executor::new(cancel.clone());
        let tool = Interrupted(cancel);
        let trigger = BuildTrigger::new(&tool, &exec);

        let err = trigger
            .run(dir.path(), "k", "n", "http://x", &credential())
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_directory_is_checked_first() {
        let exec = Executor::new(CancellationToken::new());
        let tool = FixedOutcome(Some(0));
        let trigger = BuildTrigger::new(&tool, &exec);

        let err = trigger
            .run(Path::new("/nonexistent/sonarup"), "k", "n", "http://x", &credential())
            .unwrap_err();
        assert!(matches!(err, Error::DirectoryMissing(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_build_tool_runs_in_directory() {
        let dir = TempDir::new().unwrap();
        let credential = credential();
        // `true` ignores its arguments and exits 0
        let tool = CommandBuildTool::new("true", vec![]);
        let outcome = tool
            .run(&BuildRequest {
                directory: dir.path(),
                project_key: "k",
                project_name: "n",
                server_url: "http://x",
                credential: &credential,
            })
            .unwrap();
        assert!(outcome.success());
    }
}
