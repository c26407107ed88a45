//! Terminal rendering of step events and run summaries. Separate from the
//! tracing output, which goes to stderr.

mod palette;
mod views;

pub use palette::Palette;
pub use views::{FailureView, StepEventView, SummaryView};
