pub mod credential;
pub mod error;
pub mod resource;
pub mod run;

pub use credential::Credential;
pub use error::{Error, Result};
pub use resource::*;
pub use run::{FullRun, ReanalysisRun, RunConfig, RunMode, is_valid_project_key};
