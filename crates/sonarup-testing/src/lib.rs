//! Testing infrastructure for sonarup integration tests.
//!
//! - `MockServer`: in-memory analysis server that records every call
//! - `fakes`: container runtime, build tool and browser stand-ins
//! - `TestWorld`: isolated directory and config for CLI runs

pub mod fakes;
pub mod mock_server;
pub mod world;

pub use fakes::{BuildCall, FakeBuildTool, FakeContainerRuntime, RecordingOpener};
pub use mock_server::{Call, MockServer};
pub use world::{CliResult, TestWorld};
