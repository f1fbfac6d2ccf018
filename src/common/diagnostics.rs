//! Structured diagnostic channel.
//!
//! Every condition that makes the parser skip, truncate or give up on data is
//! recorded here (and mirrored to `tracing`), so a caller can tell a clean
//! parse from a partial one without installing a subscriber.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How bad a reported condition is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Data was kept but something was skipped or left as-is (formula
    /// failures, column truncation).
    Warning,
    /// Parsing of one sheet was abandoned (resource bounds).
    Error,
    /// The whole document parse stopped (corruption, memory ceiling).
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// One reported condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Sheet the condition was raised in, when there was one
    pub sheet: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{} [{}]: {}", self.severity, sheet, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Ordered collection of diagnostics produced by one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a condition and log it at the matching `tracing` level.
    pub fn report(&mut self, severity: Severity, sheet: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        let sheet_name = sheet.unwrap_or("-");
        match severity {
            Severity::Warning => tracing::warn!(sheet = sheet_name, "{}", message),
            Severity::Error | Severity::Fatal => {
                tracing::error!(sheet = sheet_name, severity = %severity, "{}", message)
            },
        }
        self.entries.push(Diagnostic {
            severity,
            sheet: sheet.map(str::to_string),
            message,
        });
    }

    pub fn warn(&mut self, sheet: Option<&str>, message: impl Into<String>) {
        self.report(Severity::Warning, sheet, message);
    }

    pub fn error(&mut self, sheet: Option<&str>, message: impl Into<String>) {
        self.report(Severity::Error, sheet, message);
    }

    pub fn fatal(&mut self, sheet: Option<&str>, message: impl Into<String>) {
        self.report(Severity::Fatal, sheet, message);
    }

    /// Append everything from another collection, keeping order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest severity seen, if anything was reported.
    pub fn worst(&self) -> Option<Severity> {
        self.entries.iter().map(|d| d.severity).max()
    }

    /// Whether the parse was stopped before the end of the document.
    pub fn has_fatal(&self) -> bool {
        self.worst() == Some(Severity::Fatal)
    }

    /// Number of entries with exactly this severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_severity() {
        let mut diags = Diagnostics::new();
        assert_eq!(diags.worst(), None);
        diags.warn(Some("Sheet1"), "truncated");
        assert_eq!(diags.worst(), Some(Severity::Warning));
        diags.error(None, "bad repeat");
        assert_eq!(diags.worst(), Some(Severity::Error));
        assert!(!diags.has_fatal());
        diags.fatal(None, "corrupted");
        assert!(diags.has_fatal());
        assert_eq!(diags.count(Severity::Warning), 1);
        assert_eq!(diags.len(), 3);
    }

    #[test]
    fn test_display() {
        let mut diags = Diagnostics::new();
        diags.warn(Some("Data"), "formula left unresolved");
        diags.fatal(None, "stack overflow");
        let lines: Vec<String> = diags.iter().map(|d| d.to_string()).collect();
        assert_eq!(lines[0], "warning [Data]: formula left unresolved");
        assert_eq!(lines[1], "fatal: stack overflow");
    }
}
