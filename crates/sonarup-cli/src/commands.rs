use super::args::Cli;
use super::handlers;
use crate::logging;
use anyhow::Result;
use sonarup_runtime::Settings;

pub fn run(cli: Cli) -> Result<()> {
    logging::init(cli.log_level);

    let config = cli.run_config()?;
    let settings = Settings::resolve(cli.config.as_deref())?;

    handlers::provision::handle(&settings, &config, !cli.no_browser)
}

/// Process exit code for a failed run: the build tool's own code when the
/// analysis failed, 1 for everything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<sonarup_runtime::Error>()
        .map(sonarup_runtime::Error::exit_code)
        .unwrap_or(1)
}
