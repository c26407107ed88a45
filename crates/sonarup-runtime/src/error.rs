use crate::orchestrator::RunState;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Result type for sonarup-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while provisioning or analyzing
#[derive(Debug)]
pub enum Error {
    /// Domain value failed validation
    Types(sonarup_types::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Manifest could not be rendered
    Manifest(String),

    /// An HTTP request or external command failed
    Remote {
        context: String,
        status: Option<i32>,
        detail: String,
    },

    /// A readiness predicate did not hold within its bounded wait
    Timeout { what: String, waited: Duration },

    /// A freshly created quality gate lacks a condition that must be tuned
    MissingCondition { gate: String, metric: String },

    /// A project with the requested name already exists on the server
    ProjectExists { name: String },

    /// Re-analysis was asked for a project the server does not know
    ProjectNotFound { name: String },

    /// A file the run would generate is already present
    FileExists(PathBuf),

    /// The project directory does not exist
    DirectoryMissing(PathBuf),

    /// No persisted token for the project
    CredentialMissing(PathBuf),

    /// A generated or loaded token was empty
    EmptyCredential { source: String },

    /// The server rejected the token
    InvalidCredential { project: String },

    /// The build tool exited unsuccessfully
    BuildFailed { code: Option<i32> },

    /// The run was interrupted
    Cancelled,

    /// The controller attempted a transition outside its state machine
    InvalidTransition { from: RunState, to: RunState },
}

impl Error {
    /// Process exit code for this failure. Build failures propagate the build
    /// tool's own code; everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::BuildFailed { code: Some(code) } if *code != 0 => *code,
            _ => 1,
        }
    }

    pub fn remote(context: impl Into<String>, status: Option<i32>, detail: impl Into<String>) -> Self {
        Error::Remote {
            context: context.into(),
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Types(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Manifest(msg) => write!(f, "Manifest error: {}", msg),
            Error::Remote {
                context,
                status,
                detail,
            } => {
                match status {
                    Some(code) => write!(f, "{} (status {})", context, code)?,
                    None => write!(f, "{}", context)?,
                }
                if !detail.is_empty() {
                    write!(f, ": {}", detail)?;
                }
                Ok(())
            }
            Error::Timeout { what, waited } => {
                write!(f, "Timed out after {}s waiting for {}", waited.as_secs(), what)
            }
            Error::MissingCondition { gate, metric } => write!(
                f,
                "Quality gate '{}' has no condition on metric '{}'",
                gate, metric
            ),
            Error::ProjectExists { name } => write!(
                f,
                "A project named '{}' already exists; use re-analysis mode or pick another name",
                name
            ),
            Error::ProjectNotFound { name } => write!(
                f,
                "No project named '{}' on the server; run a full provisioning first",
                name
            ),
            Error::FileExists(path) => write!(
                f,
                "Refusing to overwrite existing file {}; move it aside and retry",
                path.display()
            ),
            Error::DirectoryMissing(path) => {
                write!(f, "Project directory not found: {}", path.display())
            }
            Error::CredentialMissing(path) => write!(
                f,
                "No token file at {}; run a full provisioning first",
                path.display()
            ),
            Error::EmptyCredential { source } => write!(f, "Empty token from {}", source),
            Error::InvalidCredential { project } => {
                write!(f, "The server rejected the token for project '{}'", project)
            }
            Error::BuildFailed { code: Some(code) } => {
                write!(f, "Analysis failed: build tool exited with status {}", code)
            }
            Error::BuildFailed { code: None } => {
                write!(f, "Analysis failed: build tool was terminated by a signal")
            }
            Error::Cancelled => write!(f, "Interrupted"),
            Error::InvalidTransition { from, to } => {
                write!(f, "Invalid state transition: {:?} -> {:?}", from, to)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Types(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sonarup_types::Error> for Error {
    fn from(err: sonarup_types::Error) -> Self {
        Error::Types(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Manifest(err.to_string())
    }
}
