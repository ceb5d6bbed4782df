use async_trait::async_trait;

use crate::error::DiagnosticError;
use crate::result::DiagnosticResult;

/// A pluggable health check.
///
/// Callers ask [`Diagnostic::can_run`] first and only invoke
/// [`Diagnostic::check`] when the gate passes. `check` never fails: every
/// problem it runs into becomes a finding inside the returned result.
#[async_trait]
pub trait Diagnostic: Send + Sync {
    /// Stable identifier, also used as the origin of every finding
    fn name(&self) -> &str;

    /// Short human-oriented summary
    fn description(&self) -> &str;

    /// Precondition gate.
    ///
    /// Returns an error describing what is missing (configuration, client
    /// handles, authorization). Has no side effects and may be called any
    /// number of times.
    async fn can_run(&self) -> Result<(), DiagnosticError>;

    /// Run the check and return its findings
    async fn check(&self) -> DiagnosticResult;
}
