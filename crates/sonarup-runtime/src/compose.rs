use crate::api::{CallError, CallResult};
use crate::config::ComposeSettings;
use std::path::Path;
use std::process::{Command, Stdio};

/// Brings up the services described by a manifest.
pub trait ContainerRuntime {
    fn apply(&self, manifest: &Path) -> CallResult<()>;
}

/// `docker compose -p <project> -f <manifest> up -d`, output suppressed.
pub struct DockerCompose {
    program: String,
    project_name: String,
}

impl DockerCompose {
    pub fn new(program: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            project_name: project_name.into(),
        }
    }

    pub fn from_settings(settings: &ComposeSettings) -> Self {
        Self::new(&settings.program, &settings.project_name)
    }
}

impl ContainerRuntime for DockerCompose {
    fn apply(&self, manifest: &Path) -> CallResult<()> {
        let output = Command::new(&self.program)
            .arg("compose")
            .arg("-p")
            .arg(&self.project_name)
            .arg("-f")
            .arg(manifest)
            .args(["up", "-d"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| CallError::transport(format!("{}: {}", self.program, err)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CallError::new(
                output.status.code(),
                stderr.lines().last().unwrap_or_default().to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_transport_error() {
        let runtime = DockerCompose::new("sonarup-no-such-binary", "test");
        let err = runtime.apply(Path::new("docker-compose.yml")).unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.message.contains("sonarup-no-such-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_carries_code() {
        // `false` ignores its arguments and exits 1
        let runtime = DockerCompose::new("false", "test");
        let err = runtime.apply(Path::new("docker-compose.yml")).unwrap_err();
        assert_eq!(err.status, Some(1));
    }
}
