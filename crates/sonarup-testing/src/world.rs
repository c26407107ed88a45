//! TestWorld pattern for CLI integration tests.
//!
//! Every world gets its own temp directory, a project directory, a token
//! directory and a config file pointing at an unreachable server with short
//! timeouts, so no test ever talks to a real installation.

use anyhow::Result;
use assert_cmd::Command;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Environment variables the CLI reads; cleared for every run.
const SONARUP_ENV: [&str; 4] = [
    "SONARUP_CONFIG",
    "SONARUP_SERVER_URL",
    "SONARUP_ADMIN_LOGIN",
    "SONARUP_ADMIN_PASSWORD",
];

/// Declarative test environment builder.
///
/// # Example
/// ```no_run
/// use sonarup_testing::TestWorld;
///
/// let world = TestWorld::new().with_token("billing", "squ_abc");
/// let result = world.run(&["billing", "billing"]).unwrap();
/// assert!(!result.success());
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    cwd: PathBuf,
    config_path: PathBuf,
    token_dir: PathBuf,
    compose_program: String,
    extra_config: String,
    env_vars: HashMap<String, String>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_path = temp_dir.path().to_path_buf();
        let token_dir = base_path.join("tokens");
        let config_path = base_path.join("sonarup.toml");

        std::fs::create_dir_all(&token_dir).expect("Failed to create token dir");

        let world = Self {
            cwd: base_path,
            temp_dir,
            config_path,
            token_dir,
            compose_program: "sonarup-test-no-such-container-runtime".to_string(),
            extra_config: String::new(),
            env_vars: HashMap::new(),
        };
        world.write_config();
        world
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn token_dir(&self) -> &Path {
        &self.token_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Create a project directory (relative to the temp root).
    pub fn with_project(self, name: &str) -> Self {
        std::fs::create_dir_all(self.temp_dir.path().join(name))
            .expect("Failed to create project dir");
        self
    }

    /// Persist a token as a previous full run would have.
    pub fn with_token(self, project_name: &str, token: &str) -> Self {
        std::fs::write(self.token_dir.join(format!("token_{}", project_name)), token)
            .expect("Failed to write token file");
        self
    }

    /// Append extra TOML to the generated config.
    pub fn with_config(mut self, extra: &str) -> Self {
        self.extra_config = extra.to_string();
        self.write_config();
        self
    }

    /// Bring services up with `program` instead of a runtime that is never
    /// found.
    pub fn with_compose_program(mut self, program: &str) -> Self {
        self.compose_program = program.to_string();
        self.write_config();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    fn write_config(&self) {
        let base = format!(
            r#"[server]
url = "http://127.0.0.1:9"

[paths]
manifest = "{manifest}"
token_dir = "{tokens}"

[timing]
readiness_timeout_secs = 1
settle_timeout_secs = 1
poll_interval_ms = 50

[build]
program = "sonarup-test-no-such-build-tool"

[compose]
program = "{compose}"
"#,
            manifest = toml_path(&self.temp_dir.path().join("docker-compose.yml")),
            tokens = toml_path(&self.token_dir),
            compose = self.compose_program,
        );
        std::fs::write(&self.config_path, format!("{}\n{}", base, self.extra_config))
            .expect("Failed to write config");
    }

    /// Configure a CLI command with this world's config, cwd and env vars.
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.arg("--config").arg(&self.config_path).arg("--no-browser");
        cmd.current_dir(&self.cwd);

        for key in SONARUP_ENV {
            cmd.env_remove(key);
        }
        cmd.env_remove("RUST_LOG");
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        cmd
    }

    /// Run the `sonarup` binary with `args` inside this world.
    #[allow(deprecated)]
    pub fn run(&self, args: &[&str]) -> Result<CliResult> {
        let mut cmd = Command::cargo_bin("sonarup")
            .map_err(|e| anyhow::anyhow!("Failed to find sonarup binary: {}", e))?;

        self.configure_command(&mut cmd);
        cmd.args(args);

        let output = cmd.output()?;

        Ok(CliResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}

/// Result of a CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}
