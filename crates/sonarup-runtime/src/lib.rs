pub mod api;
pub mod build;
pub mod cancel;
pub mod compose;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod opener;
pub mod orchestrator;
pub mod poll;
pub mod progress;
pub mod reconcile;
pub mod token;
pub mod workspace;

pub use api::{CallError, CallResult, HttpQualityServer, QualityServer, TokenRequest};
pub use build::{BuildOutcome, BuildRequest, BuildTool, BuildTrigger, CommandBuildTool};
pub use cancel::CancellationToken;
pub use compose::{ContainerRuntime, DockerCompose};
pub use config::Settings;
pub use error::{Error, Result};
pub use executor::Executor;
pub use opener::{NoopOpener, SystemOpener, UrlOpener};
pub use orchestrator::{
    Collaborators, Orchestrator, RunState, RunSummary, Step, StepDetail, StepEvent,
};
pub use poll::PollPolicy;
pub use progress::ProgressReporter;
pub use reconcile::{Reconciled, Reconciler};
pub use token::{TokenManager, TokenStore};
pub use workspace::Artifacts;
