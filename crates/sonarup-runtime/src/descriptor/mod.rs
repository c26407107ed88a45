//! Generated files consumed by the container runtime and the build tool.

pub mod manifest;
pub mod properties;

pub use manifest::ComposeManifest;
pub use properties::AnalysisConfig;
