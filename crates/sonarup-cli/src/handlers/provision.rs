use crate::presentation::{FailureView, Palette, StepEventView, SummaryView};
use anyhow::Result;
use sonarup_runtime::{
    CancellationToken, Collaborators, CommandBuildTool, DockerCompose, Error, HttpQualityServer,
    NoopOpener, Orchestrator, Settings, SystemOpener, UrlOpener,
};
use sonarup_types::RunConfig;
use std::io::Write;

pub fn handle(settings: &Settings, config: &RunConfig, open_browser: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);

    let server = HttpQualityServer::from_settings(&settings.server)
        .map_err(|e| Error::remote("Failed to build HTTP client", e.status, e.message))?;
    let containers = DockerCompose::from_settings(&settings.compose);
    let build = CommandBuildTool::from_settings(&settings.build);
    let opener: Box<dyn UrlOpener> = if open_browser {
        Box::new(SystemOpener)
    } else {
        Box::new(NoopOpener)
    };

    let deps = Collaborators {
        server: &server,
        containers: &containers,
        build: &build,
        opener: opener.as_ref(),
    };

    tracing::info!(
        mode = ?config.mode(),
        project = config.project_name(),
        server = %settings.server.url,
        "starting run"
    );

    let palette = Palette::detect();
    let mut orchestrator = Orchestrator::new(settings, config, deps, cancel);
    let result = orchestrator.run(|event| {
        let text = StepEventView::new(&event, palette).to_string();
        if !text.is_empty() {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
    });

    match result {
        Ok(summary) => {
            print!("{}", SummaryView::new(&summary, palette));
            Ok(())
        }
        Err(err) => {
            eprint!("{}", FailureView::new(config.mode(), palette));
            Err(err.into())
        }
    }
}

/// SIGINT and SIGTERM only set the token; the controller notices it between
/// calls and takes the abort path, so cleanup still runs.
fn install_interrupt_handler(cancel: &CancellationToken) {
    let token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || token.cancel()) {
        tracing::warn!(error = %err, "could not install interrupt handler");
    }
}
