//! Error classification shared by every fixstate crate.
//!
//! Each crate keeps its own error enum; `kind()` on those enums maps a
//! concrete failure onto one of these categories so callers can branch on
//! the category without matching error strings.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A caller-supplied path or argument failed a precondition.
    InvalidInput,
    /// A state archive exists but is not a valid state archive.
    InvalidFormat,
    /// The configured database connection type has no registered backend.
    UnsupportedBackend,
    /// A required external executable cannot be run.
    ToolUnavailable,
    /// An external process or an archive commit failed.
    RuntimeError,
    /// The bootstrapper target already holds an installation.
    AlreadyInstalled,
    /// Plain I/O failure not covered by a more specific category.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "invalid input"),
            ErrorKind::InvalidFormat => write!(f, "invalid format"),
            ErrorKind::UnsupportedBackend => write!(f, "unsupported backend"),
            ErrorKind::ToolUnavailable => write!(f, "tool unavailable"),
            ErrorKind::RuntimeError => write!(f, "runtime error"),
            ErrorKind::AlreadyInstalled => write!(f, "already installed"),
            ErrorKind::Io => write!(f, "I/O error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(ErrorKind::InvalidFormat.to_string(), "invalid format");
        assert_eq!(ErrorKind::AlreadyInstalled.to_string(), "already installed");
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ToolUnavailable).unwrap();
        assert_eq!(json, "\"tool_unavailable\"");
    }
}
