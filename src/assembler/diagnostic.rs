//! Parse failures are collected as diagnostics rather than aborting the
//! parse. Every diagnostic is an error: a program with any of them must
//! not be handed to a later stage.
use std::fmt;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(line: usize, message: S) -> Self {
        Diagnostic { line, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Renders a diagnostic together with the source line it points at.
pub fn format_diagnostic(diag: &Diagnostic, source: &str) -> String {
    let line_text = source
        .lines()
        .nth(diag.line.saturating_sub(1))
        .unwrap_or("")
        .trim_end();
    format!("error:{}: {}\n  {}", diag.line, diag.message, line_text)
}
