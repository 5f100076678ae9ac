use std::fmt;

/// Error codes for lowering diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E4xxx: Lowering errors (recoverable, reported next to an error node)
/// - E9xxx: Internal limits (fatal to the current unit)
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Lowering Errors (E4xxx)
    /// Reference to a variable never declared in an enclosing scope
    E4001,
    /// `break`/`continue` outside of a loop
    E4002,
    /// Malformed enum parameter extraction
    E4003,
    /// Unsupported assignment target
    E4004,

    // Internal Limits (E9xxx)
    /// Total node budget exceeded
    E9001,
    /// Per-kind repetition budget exceeded
    E9002,
    /// Unit root is missing
    E9003,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E4004 => "E4004",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
            ErrorCode::E9003 => "E9003",
        }
    }

    pub fn is_lowering_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E4001 | ErrorCode::E4002 | ErrorCode::E4003 | ErrorCode::E4004
        )
    }

    /// Internal limits end the current unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCode::E9001 | ErrorCode::E9002 | ErrorCode::E9003)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
