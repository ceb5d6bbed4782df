//! Gate, run and aggregate a set of diagnostics.

use std::sync::Arc;
use tracing::{info, warn};

use crate::diagnostic::Diagnostic;
use crate::error::DiagnosticError;
use crate::result::{DiagnosticResult, Level};

/// What happened to one diagnostic
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The gate refused to run it
    Skipped {
        name: String,
        error: DiagnosticError,
    },
    Completed(DiagnosticResult),
}

impl Outcome {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Skipped { name, .. } => name,
            Self::Completed(result) => result.origin(),
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&DiagnosticResult> {
        match self {
            Self::Skipped { .. } => None,
            Self::Completed(result) => Some(result),
        }
    }
}

/// Aggregated outcomes in the order the diagnostics were given
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    outcomes: Vec<Outcome>,
}

impl DiagnosticReport {
    #[must_use]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    fn results(&self) -> impl Iterator<Item = &DiagnosticResult> {
        self.outcomes.iter().filter_map(Outcome::result)
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.results().filter(|r| r.passed()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results().filter(|r| r.failed()).count()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.results().count()
    }

    /// Warning findings across all completed diagnostics
    #[must_use]
    pub fn warnings(&self) -> usize {
        self.results().map(|r| r.count(Level::Warning)).sum()
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.results().map(|r| r.count(Level::Error)).sum()
    }

    /// No completed diagnostic failed
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.failed() == 0
    }
}

/// Run each diagnostic whose gate passes, one after another
pub async fn run_diagnostics(diagnostics: &[Arc<dyn Diagnostic>]) -> DiagnosticReport {
    let mut outcomes = Vec::with_capacity(diagnostics.len());

    for diagnostic in diagnostics {
        let name = diagnostic.name().to_string();
        match diagnostic.can_run().await {
            Ok(()) => {
                info!(diagnostic = %name, "Running diagnostic: {}", diagnostic.description());
                let result = diagnostic.check().await;
                info!(
                    diagnostic = %name,
                    passed = result.passed(),
                    findings = result.findings().len(),
                    "Diagnostic completed"
                );
                outcomes.push(Outcome::Completed(result));
            }
            Err(error) => {
                warn!(diagnostic = %name, error = %error, "Skipping diagnostic");
                outcomes.push(Outcome::Skipped { name, error });
            }
        }
    }

    DiagnosticReport { outcomes }
}
