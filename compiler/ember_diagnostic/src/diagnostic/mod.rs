//! Diagnostics reported while lowering a unit.
//!
//! Lowering never renders diagnostics itself; the host owns presentation.
//! `Display` gives a compact one-diagnostic form for logs and tests.

use std::fmt;

use ember_ir::Span;

use crate::ErrorCode;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source span annotated with a short explanation.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
    /// Marks where the problem is, as opposed to related context.
    pub primary: bool,
}

/// A diagnostic produced while lowering one unit.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "a diagnostic does nothing unless reported"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn blank(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    #[cold]
    pub fn error(code: ErrorCode) -> Self {
        Self::blank(code, Severity::Error)
    }

    #[cold]
    pub fn warning(code: ErrorCode) -> Self {
        Self::blank(code, Severity::Warning)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn push_label(mut self, span: Span, message: String, primary: bool) -> Self {
        self.labels.push(Label {
            span,
            message,
            primary,
        });
        self
    }

    /// Label the offending construct.
    pub fn with_label(self, span: Span, message: impl Into<String>) -> Self {
        self.push_label(span, message.into(), true)
    }

    /// Label related context, such as the declaration a use refers to.
    pub fn with_secondary_label(self, span: Span, message: impl Into<String>) -> Self {
        self.push_label(span, message.into(), false)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }

    pub fn primary_span(&self) -> Option<Span> {
        self.labels
            .iter()
            .find_map(|label| label.primary.then_some(label.span))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        for Label { span, message, .. } in &self.labels {
            write!(f, "\n  --> {span}: {message}")?;
        }
        for note in &self.notes {
            write!(f, "\n  = {note}")?;
        }
        Ok(())
    }
}

// Common diagnostics

/// A reference to a variable no enclosing scope declared.
#[cold]
pub fn undeclared_variable(span: Span, name: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4001)
        .with_message(format!("reference to undeclared variable `{name}`"))
        .with_label(span, "not declared in any enclosing scope")
}

/// `break` or `continue` with no loop to leave.
#[cold]
pub fn loop_control_outside_loop(span: Span, keyword: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4002)
        .with_message(format!("`{keyword}` outside of a loop"))
        .with_label(span, format!("`{keyword}` has no enclosing loop"))
}

/// An enum parameter extraction whose subject or index cannot be resolved.
#[cold]
pub fn malformed_enum_parameter(span: Span, ctor: &str, index: u32) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4003)
        .with_message(format!(
            "malformed extraction of parameter {index} of `{ctor}`"
        ))
        .with_label(span, "extraction subject is not a tagged union")
}

/// Assignment to something that is neither a local, a field, nor an index.
#[cold]
pub fn unsupported_assignment_target(span: Span, target: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4004)
        .with_message(format!("cannot assign to {target}"))
        .with_label(span, "unsupported assignment target")
}
