//! Diagnostics for the lowering core.
//!
//! Every diagnostic carries:
//! - An error code for searchability
//! - A message saying what went wrong
//! - A primary span saying where
//! - Optional notes with context
//!
//! Recoverable problems are collected per unit and handed back next to the
//! converted tree; fatal ones end the unit with a single diagnostic.

mod diagnostic;
mod error_code;

pub use diagnostic::{
    loop_control_outside_loop, malformed_enum_parameter, undeclared_variable,
    unsupported_assignment_target, Diagnostic, Label, Severity,
};
pub use error_code::ErrorCode;
