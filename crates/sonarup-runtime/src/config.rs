use crate::poll::PollPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolve the settings file path based on priority:
/// 1. Explicit path
/// 2. SONARUP_CONFIG environment variable
/// 3. sonarup.toml in the current directory
/// 4. XDG config directory (sonarup/config.toml)
///
/// Returns `None` when no candidate file exists; callers fall back to defaults.
pub fn resolve_settings_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("SONARUP_CONFIG")
        && !env_path.is_empty()
    {
        return Some(expand_tilde(&env_path));
    }

    let local = PathBuf::from("sonarup.toml");
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("sonarup").join("config.toml"))
        .filter(|path| path.exists())
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub url: String,
    pub admin_login: String,
    pub admin_password: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            admin_login: "admin".to_string(),
            admin_password: "admin".to_string(),
        }
    }
}

impl ServerSettings {
    /// Dashboard URL for a project.
    pub fn dashboard_url(&self, project_key: &str) -> String {
        format!("{}/dashboard?id={}", self.url.trim_end_matches('/'), project_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub gate_name: String,
    pub profile_name: String,
    pub language: String,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            gate_name: "Strict Gate".to_string(),
            profile_name: "Strict Java".to_string(),
            language: "java".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Where the compose manifest is written.
    pub manifest: PathBuf,
    /// Directory holding `token_<project>` files.
    pub token_dir: PathBuf,
    /// File name of the analysis properties, relative to the project directory.
    pub properties_file: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("docker-compose.yml"),
            token_dir: PathBuf::from("."),
            properties_file: "sonar-project.properties".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Upper bound on waiting for the server to report UP after the
    /// containers start.
    pub readiness_timeout_secs: u64,
    /// Upper bound on waiting for a newly created resource to become queryable.
    pub settle_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            readiness_timeout_secs: 300,
            settle_timeout_secs: 30,
            poll_interval_ms: 2000,
        }
    }
}

impl TimingSettings {
    pub fn readiness(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.readiness_timeout_secs),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn settle(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.settle_timeout_secs),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub program: String,
    pub goals: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            program: "mvn".to_string(),
            goals: vec![
                "clean".to_string(),
                "verify".to_string(),
                "sonar:sonar".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    pub program: String,
    pub project_name: String,
    pub sonarqube_image: String,
    pub postgres_image: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub restart_retries: u32,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            project_name: "sonarup".to_string(),
            sonarqube_image: "sonarqube:lts-community".to_string(),
            postgres_image: "postgres:15".to_string(),
            db_user: "sonar".to_string(),
            db_password: "sonar".to_string(),
            db_name: "sonar".to_string(),
            restart_retries: 3,
        }
    }
}

/// Everything a run needs besides its command-line inputs, including the
/// administrator identity used for every API call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub quality: QualitySettings,
    pub paths: PathSettings,
    pub timing: TimingSettings,
    pub build: BuildSettings,
    pub compose: ComposeSettings,
}

impl Settings {
    /// Load from the resolved path, then apply environment overrides.
    ///
    /// An explicit path must exist; an implicit one falls back to defaults.
    pub fn resolve(explicit_path: Option<&Path>) -> Result<Self> {
        let mut settings = match resolve_settings_path(explicit_path) {
            Some(path) if explicit_path.is_some() && !path.exists() => {
                return Err(Error::Config(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `SONARUP_SERVER_URL`, `SONARUP_ADMIN_LOGIN` and
    /// `SONARUP_ADMIN_PASSWORD` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SONARUP_SERVER_URL").filter(|v| !v.is_empty()) {
            self.server.url = url;
        }
        if let Some(login) = lookup("SONARUP_ADMIN_LOGIN").filter(|v| !v.is_empty()) {
            self.server.admin_login = login;
        }
        if let Some(password) = lookup("SONARUP_ADMIN_PASSWORD") {
            self.server.admin_password = password;
        }
    }
}
