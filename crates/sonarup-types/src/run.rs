use crate::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters the analysis server accepts in a project key.
static PROJECT_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:-]+$").unwrap());

/// Check a project key against the server's key grammar: allowed characters
/// only, and at least one character that is not a digit.
pub fn is_valid_project_key(key: &str) -> bool {
    PROJECT_KEY_REGEX.is_match(key) && key.chars().any(|c| !c.is_ascii_digit())
}

/// Which workflow a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Provision the environment and server resources, then analyze.
    Full,
    /// Reuse a persisted token and only re-run the analysis.
    Reanalyze,
}

/// Inputs of a full provisioning run. Every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullRun {
    pub project_key: String,
    pub project_name: String,
    pub main_branch: String,
    /// Name under which the analysis token is minted.
    pub analyze: String,
    pub directory: PathBuf,
}

/// Inputs of a re-analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReanalysisRun {
    pub project_name: String,
    pub directory: PathBuf,
}

/// Resolved command-line input. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunConfig {
    Full(FullRun),
    Reanalyze(ReanalysisRun),
}

impl RunConfig {
    pub fn full(
        project_key: impl Into<String>,
        project_name: impl Into<String>,
        main_branch: impl Into<String>,
        analyze: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Result<Self> {
        let run = FullRun {
            project_key: non_empty("project key", project_key.into())?,
            project_name: non_empty("project name", project_name.into())?,
            main_branch: non_empty("main branch", main_branch.into())?,
            analyze: non_empty("analyze", analyze.into())?,
            directory: non_empty_path(directory.into())?,
        };

        if !is_valid_project_key(&run.project_key) {
            return Err(Error::invalid(
                "project key",
                format!(
                    "'{}' must use letters, digits, '-', '_', '.' or ':' and contain at least one non-digit",
                    run.project_key
                ),
            ));
        }

        Ok(RunConfig::Full(run))
    }

    pub fn reanalyze(
        project_name: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(RunConfig::Reanalyze(ReanalysisRun {
            project_name: non_empty("project name", project_name.into())?,
            directory: non_empty_path(directory.into())?,
        }))
    }

    pub fn mode(&self) -> RunMode {
        match self {
            RunConfig::Full(_) => RunMode::Full,
            RunConfig::Reanalyze(_) => RunMode::Reanalyze,
        }
    }

    pub fn project_name(&self) -> &str {
        match self {
            RunConfig::Full(run) => &run.project_name,
            RunConfig::Reanalyze(run) => &run.project_name,
        }
    }

    /// Key given on the command line. A re-analysis run only knows the
    /// project name; its key is looked up on the server.
    pub fn project_key(&self) -> Option<&str> {
        match self {
            RunConfig::Full(run) => Some(&run.project_key),
            RunConfig::Reanalyze(_) => None,
        }
    }

    pub fn directory(&self) -> &Path {
        match self {
            RunConfig::Full(run) => &run.directory,
            RunConfig::Reanalyze(run) => &run.directory,
        }
    }
}

fn non_empty(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn non_empty_path(path: PathBuf) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::invalid("directory", "must not be empty"));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_run_requires_every_field() {
        assert!(RunConfig::full("k", "n", "main", "tkn", "./proj").is_ok());
        assert!(RunConfig::full("", "n", "main", "tkn", "./proj").is_err());
        assert!(RunConfig::full("k", "n", " ", "tkn", "./proj").is_err());
        assert!(RunConfig::full("k", "n", "main", "tkn", "").is_err());
    }

    #[test]
    fn test_reanalysis_has_no_key_of_its_own() {
        let run = RunConfig::reanalyze("billing", "./billing").unwrap();
        assert_eq!(run.mode(), RunMode::Reanalyze);
        assert_eq!(run.project_key(), None);
        assert_eq!(run.directory(), Path::new("./billing"));
    }

    #[test]
    fn test_full_run_rejects_bad_key() {
        let err = RunConfig::full("my key", "n", "main", "tkn", "./proj").unwrap_err();
        assert!(err.to_string().contains("project key"));
    }
}
