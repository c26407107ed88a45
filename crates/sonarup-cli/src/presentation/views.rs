use std::fmt;

use super::Palette;
use sonarup_runtime::{Reconciled, RunSummary, Step, StepDetail, StepEvent};
use sonarup_types::RunMode;

pub struct StepEventView<'a> {
    event: &'a StepEvent,
    palette: Palette,
}

impl<'a> StepEventView<'a> {
    pub fn new(event: &'a StepEvent, palette: Palette) -> Self {
        Self { event, palette }
    }
}

impl fmt::Display for StepEventView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.palette;
        match self.event {
            // The build streams its own output; announce it first.
            StepEvent::Started(step @ Step::Analyze) => {
                writeln!(f, "{} {}...", p.muted("→"), step.label())
            }
            StepEvent::Started(_) => Ok(()),
            StepEvent::Completed(step, detail) => {
                write!(f, "{} {}", p.success("✓"), step.label())?;
                match detail {
                    StepDetail::Done => writeln!(f),
                    StepDetail::Reconciled(Reconciled::Created) => {
                        writeln!(f, " {}", p.muted("(created)"))
                    }
                    StepDetail::Reconciled(Reconciled::AlreadyPresent) => {
                        writeln!(f, " {}", p.muted("(already present, unchanged)"))
                    }
                    StepDetail::Wrote(path) => {
                        writeln!(f, " {}", p.muted(&path.display().to_string()))
                    }
                    StepDetail::Opened(url) => writeln!(f, " {}", p.muted(url)),
                }
            }
            StepEvent::Failed(step, message) => {
                writeln!(f, "{} {}: {}", p.failure("✗"), step.label(), message)
            }
            StepEvent::CleanedUp { removed } if !removed.is_empty() => {
                writeln!(
                    f,
                    "{}",
                    p.muted(&format!("Removed {} generated file(s)", removed.len()))
                )
            }
            StepEvent::CleanedUp { .. } | StepEvent::StateChanged { .. } => Ok(()),
        }
    }
}

pub struct SummaryView<'a> {
    summary: &'a RunSummary,
    palette: Palette,
}

impl<'a> SummaryView<'a> {
    pub fn new(summary: &'a RunSummary, palette: Palette) -> Self {
        Self { summary, palette }
    }
}

impl fmt::Display for SummaryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.palette;
        let s = self.summary;
        writeln!(f)?;
        match s.mode {
            RunMode::Full => {
                writeln!(
                    f,
                    "{} Provisioned and analyzed '{}' (key {})",
                    p.success("Done."),
                    s.project_name,
                    s.project_key
                )?;
                if let Some(url) = &s.dashboard_url {
                    writeln!(f, "  Dashboard: {}", p.emphasis(url))?;
                }
                if let Some(path) = &s.token_path {
                    writeln!(f, "  Token saved to {}", path.display())?;
                    writeln!(
                        f,
                        "  Re-run the analysis with: sonarup {} <DIR>",
                        s.project_name
                    )?;
                }
            }
            RunMode::Reanalyze => {
                writeln!(
                    f,
                    "{} Re-analyzed '{}' (key {})",
                    p.success("Done."),
                    s.project_name,
                    s.project_key
                )?;
            }
        }
        Ok(())
    }
}

/// Closing lines for an aborted run. The error itself is reported by the
/// caller.
pub struct FailureView {
    mode: RunMode,
    palette: Palette,
}

impl FailureView {
    pub fn new(mode: RunMode, palette: Palette) -> Self {
        Self { mode, palette }
    }
}

impl fmt::Display for FailureView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.mode {
            RunMode::Full => "Provisioning aborted.",
            RunMode::Reanalyze => "Re-analysis aborted.",
        };
        writeln!(
            f,
            "{} {}",
            self.palette.failure(what),
            self.palette
                .muted("Generated files were removed; server resources were left in place.")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn summary(mode: RunMode) -> RunSummary {
        RunSummary {
            mode,
            project_key: "k".to_string(),
            project_name: "n".to_string(),
            dashboard_url: Some("http://localhost:9000/dashboard?id=k".to_string()),
            quality_gate: Some(Reconciled::Created),
            quality_profile: Some(Reconciled::AlreadyPresent),
            token_path: Some(PathBuf::from("./token_n")),
            removed: Vec::new(),
        }
    }

    #[test]
    fn test_completed_reconcile_shows_outcome() {
        let event = StepEvent::Completed(
            Step::QualityProfile,
            StepDetail::Reconciled(Reconciled::AlreadyPresent),
        );
        let text = StepEventView::new(&event, Palette::plain()).to_string();
        assert_eq!(
            text,
            "✓ Reconciling quality profile (already present, unchanged)\n"
        );
    }

    #[test]
    fn test_state_changes_render_nothing() {
        let event = StepEvent::StateChanged {
            from: sonarup_runtime::RunState::Init,
            to: sonarup_runtime::RunState::TokenLoaded,
        };
        assert!(StepEventView::new(&event, Palette::plain()).to_string().is_empty());
    }

    #[test]
    fn test_full_summary_mentions_dashboard_and_token() {
        let text = SummaryView::new(&summary(RunMode::Full), Palette::plain()).to_string();
        assert!(text.contains("Dashboard: http://localhost:9000/dashboard?id=k"));
        assert!(text.contains("Token saved to ./token_n"));
    }

    #[test]
    fn test_summary_differs_by_mode() {
        let full = SummaryView::new(&summary(RunMode::Full), Palette::plain()).to_string();
        let re = SummaryView::new(&summary(RunMode::Reanalyze), Palette::plain()).to_string();
        assert_ne!(full, re);
        assert!(re.contains("Re-analyzed 'n' (key k)"));
        assert!(!re.contains("Dashboard"));
    }

    #[test]
    fn test_failure_view_names_mode() {
        let text = FailureView::new(RunMode::Reanalyze, Palette::plain()).to_string();
        assert!(text.starts_with("Re-analysis aborted."));
    }
}
