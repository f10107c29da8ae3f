//! Diagnostic infrastructure shared by all compiler phases.
//!
//! Each phase accumulates `Diagnostic` values and the driver renders them
//! at the phase boundary in GCC-compatible form:
//!
//! ```text
//! file.cdd:10:5: error: expected ';', got '}'
//! ```
//!
//! A non-empty error list prevents the next phase from running, except at
//! the lex/parse boundary where the parser still runs so multiple errors
//! can be reported in one invocation.

use crate::common::source::SourceLocation;

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the translation unit from compiling.
    Error,
    /// Reported but does not fail the compilation.
    Warning,
    /// Supplementary context attached to a preceding diagnostic.
    Note,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic with severity, message, and optional location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, message: message.into(), location: None }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into(), location: None }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self { severity: Severity::Note, message: message.into(), location: None }
    }

    pub fn with_location(mut self, loc: SourceLocation) -> Self {
        self.location = Some(loc);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {}: {}", loc, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Render a batch of diagnostics to stderr, preserving emission order.
pub fn report_all(diags: &[Diagnostic]) {
    for diag in diags {
        eprintln!("{}", diag);
    }
}

/// Count the errors in a diagnostic batch.
pub fn error_count(diags: &[Diagnostic]) -> usize {
    diags.iter().filter(|d| d.severity == Severity::Error).count()
}

/// Count the warnings in a diagnostic batch.
pub fn warning_count(diags: &[Diagnostic]) -> usize {
    diags.iter().filter(|d| d.severity == Severity::Warning).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::source::SourceBuffer;

    #[test]
    fn renders_location_prefix() {
        let buf = SourceBuffer::new("a.cdd", "int\n".to_string());
        let d = Diagnostic::error("unexpected token").with_location(buf.location_at(0));
        assert_eq!(d.to_string(), "a.cdd:1:1: error: unexpected token");
    }

    #[test]
    fn counts_by_severity() {
        let diags = vec![
            Diagnostic::error("e1"),
            Diagnostic::warning("w1"),
            Diagnostic::error("e2"),
            Diagnostic::note("n1"),
        ];
        assert_eq!(error_count(&diags), 2);
        assert_eq!(warning_count(&diags), 1);
    }
}
