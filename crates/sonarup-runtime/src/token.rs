use crate::api::{QualityServer, TokenRequest};
use crate::executor::Executor;
use crate::{Error, Result};
use sonarup_types::Credential;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One token file per project name: `<dir>/token_<name>`, token bytes only.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, project_name: &str) -> PathBuf {
        let safe: String = project_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("token_{}", safe))
    }

    pub fn save(&self, project_name: &str, credential: &Credential) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(project_name);
        write_private(&path, credential.expose())?;
        Ok(path)
    }

    pub fn load(&self, project_name: &str) -> Result<Credential> {
        let path = self.path_for(project_name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::CredentialMissing(path));
            }
            Err(err) => return Err(err.into()),
        };

        Credential::new(&content).map_err(|_| Error::EmptyCredential {
            source: path.display().to_string(),
        })
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)
}

/// Produces the credential the build tool runs with: minted and persisted in
/// full mode, read back in re-analysis mode, validated against the server in
/// both.
pub struct TokenManager<'a> {
    api: &'a dyn QualityServer,
    exec: &'a Executor,
    store: &'a TokenStore,
    admin_login: &'a str,
}

impl<'a> TokenManager<'a> {
    pub fn new(
        api: &'a dyn QualityServer,
        exec: &'a Executor,
        store: &'a TokenStore,
        admin_login: &'a str,
    ) -> Self {
        Self {
            api,
            exec,
            store,
            admin_login,
        }
    }

    /// Mint a project analysis token and persist it under the project name.
    pub fn generate(
        &self,
        project_key: &str,
        project_name: &str,
        token_name: &str,
    ) -> Result<(Credential, PathBuf)> {
        let request = TokenRequest {
            login: self.admin_login.to_string(),
            token_name: token_name.to_string(),
            project_key: project_key.to_string(),
        };

        let raw = self
            .exec
            .execute("Failed to generate token", || self.api.generate_token(&request))?;

        let credential = Credential::new(&raw).map_err(|_| Error::EmptyCredential {
            source: "the token generation response".to_string(),
        })?;

        let path = self.store.save(project_name, &credential)?;
        tracing::info!(project = project_name, path = %path.display(), "token persisted");
        Ok((credential, path))
    }

    /// Read the persisted token. Issues no remote call.
    pub fn load(&self, project_name: &str) -> Result<Credential> {
        self.store.load(project_name)
    }

    pub fn validate(&self, project_name: &str, credential: &Credential) -> Result<()> {
        let valid = self
            .exec
            .execute("Failed to validate token", || self.api.validate_token(credential))?;

        if valid {
            Ok(())
        } else {
            Err(Error::InvalidCredential {
                project: project_name.to_string(),
            })
        }
    }
}
