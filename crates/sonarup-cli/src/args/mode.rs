use super::Cli;
use sonarup_types::RunConfig;
use std::fmt;

/// The command line does not describe either run mode.
#[derive(Debug)]
pub enum UsageError {
    /// Positional inputs combined with flags.
    Mixed,
    /// Neither 5 nor 2 positional inputs.
    Positional(usize),
    /// A flag combination that is neither all five nor exactly name and
    /// directory.
    Flags(Vec<&'static str>),
    /// Nothing to do.
    Empty,
    /// The shape was right but a value was rejected.
    Invalid(sonarup_types::Error),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::Mixed => write!(f, "use either positional inputs or flags, not both"),
            UsageError::Positional(count) => write!(
                f,
                "expected 5 inputs (full) or 2 inputs (re-analysis), got {}",
                count
            ),
            UsageError::Flags(given) => write!(
                f,
                "flags must be all of -p -n -m -a -d (full) or exactly -n -d (re-analysis); got {}",
                given.join(" ")
            ),
            UsageError::Empty => write!(f, "no project given; see --help"),
            UsageError::Invalid(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for UsageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UsageError::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sonarup_types::Error> for UsageError {
    fn from(err: sonarup_types::Error) -> Self {
        UsageError::Invalid(err)
    }
}

impl Cli {
    fn flags_given(&self) -> Vec<&'static str> {
        let mut given = Vec::new();
        if self.project.is_some() {
            given.push("-p");
        }
        if self.name.is_some() {
            given.push("-n");
        }
        if self.main_branch.is_some() {
            given.push("-m");
        }
        if self.analyze.is_some() {
            given.push("-a");
        }
        if self.directory.is_some() {
            given.push("-d");
        }
        given
    }

    /// Select the run mode from the shape of the inputs.
    pub fn run_config(&self) -> Result<RunConfig, UsageError> {
        let flags = self.flags_given();

        match (self.inputs.as_slice(), flags.is_empty()) {
            ([], true) => Err(UsageError::Empty),
            ([key, name, branch, analyze, dir], true) => {
                Ok(RunConfig::full(key, name, branch, analyze, dir)?)
            }
            ([name, dir], true) => Ok(RunConfig::reanalyze(name, dir)?),
            (inputs, true) => Err(UsageError::Positional(inputs.len())),
            ([], false) => self.flagged(flags),
            (_, false) => Err(UsageError::Mixed),
        }
    }

    fn flagged(&self, flags: Vec<&'static str>) -> Result<RunConfig, UsageError> {
        match (
            &self.project,
            &self.name,
            &self.main_branch,
            &self.analyze,
            &self.directory,
        ) {
            (Some(key), Some(name), Some(branch), Some(analyze), Some(dir)) => {
                Ok(RunConfig::full(key, name, branch, analyze, dir)?)
            }
            (None, Some(name), None, None, Some(dir)) => Ok(RunConfig::reanalyze(name, dir)?),
            _ => Err(UsageError::Flags(flags)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use sonarup_types::RunMode;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["sonarup"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_five_positional_is_full() {
        let config = parse(&["k", "n", "main", "tkn", "./proj"]).run_config().unwrap();
        assert_eq!(config.mode(), RunMode::Full);
        assert_eq!(config.project_key(), Some("k"));
    }

    #[test]
    fn test_two_positional_is_reanalysis() {
        let config = parse(&["n", "./proj"]).run_config().unwrap();
        assert_eq!(config.mode(), RunMode::Reanalyze);
        assert_eq!(config.project_name(), "n");
    }

    #[test]
    fn test_flags_select_mode() {
        let full = parse(&["-p", "k", "-n", "n", "-m", "main", "-a", "tkn", "-d", "./proj"])
            .run_config()
            .unwrap();
        assert_eq!(full.mode(), RunMode::Full);

        let re = parse(&["--name", "n", "--directory", "./proj"])
            .run_config()
            .unwrap();
        assert_eq!(re.mode(), RunMode::Reanalyze);
    }

    #[test]
    fn test_other_shapes_are_usage_errors() {
        assert!(matches!(parse(&[]).run_config(), Err(UsageError::Empty)));
        assert!(matches!(
            parse(&["a", "b", "c"]).run_config(),
            Err(UsageError::Positional(3))
        ));
        assert!(matches!(
            parse(&["-n", "n", "-d", "./proj", "-m", "main"]).run_config(),
            Err(UsageError::Flags(_))
        ));
        assert!(matches!(
            parse(&["-n", "n"]).run_config(),
            Err(UsageError::Flags(_))
        ));
        assert!(matches!(
            parse(&["-n", "n", "./proj"]).run_config(),
            Err(UsageError::Mixed)
        ));
    }

    #[test]
    fn test_invalid_key_is_usage_error() {
        assert!(matches!(
            parse(&["123", "n", "main", "tkn", "./proj"]).run_config(),
            Err(UsageError::Invalid(_))
        ));
        assert!(matches!(
            parse(&["n", ""]).run_config(),
            Err(UsageError::Invalid(_))
        ));
    }
}
