//! Error type shared by every public operation in the unicfg crate hierarchy.
//!
//! The variants mirror the failure classes a caller can act on: bad input
//! (`Inval`), a missing entry (`NotFound`), filesystem trouble (`Io`), a
//! malformed config or delta line (`Parse`), a package name collision
//! (`Duplicate`), and a catch-all (`Unknown`). Parse failures carry their
//! position so the CLI can print `... at line L, byte B` messages; the same
//! positions are also accumulated as [`ParseDiagnostic`] records on the
//! context during lenient imports.

/// Unified error type for all unicfg operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument failed validation before any state was touched.
    #[error("invalid argument ({0})")]
    Inval(String),

    /// The referenced package, section or option does not exist.
    #[error("entry not found ({0})")]
    NotFound(String),

    /// Wraps `std::io::Error` for stream and lock operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config or delta line could not be parsed.
    #[error("parse error ({reason}) at line {line}, byte {byte}")]
    Parse {
        /// Physical line number (1-based) where the error was detected.
        line: u32,
        /// Byte offset within the logical line.
        byte: usize,
        /// Short human-readable cause, e.g. `unterminated '`.
        reason: String,
    },

    /// A package with the same name is already attached to the context.
    #[error("duplicate package ({0})")]
    Duplicate(String),

    /// A failure that fits no other class.
    #[error("unknown error")]
    Unknown,
}

impl Error {
    pub(crate) fn inval(what: impl Into<String>) -> Self {
        Self::Inval(what.into())
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// True for parse errors, which lenient import recovers from.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Convenience alias used throughout the unicfg crates.
pub type Result<T> = std::result::Result<T, Error>;

/// One recorded parse failure from a lenient import.
///
/// Lenient mode discards the offending logical line and keeps going; each
/// discarded line leaves one of these on the context so callers can report
/// what was lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// Physical line number (1-based).
    pub line: u32,
    /// Byte offset within the logical line.
    pub byte: usize,
    /// Short cause string.
    pub reason: String,
}

impl std::fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at line {}, byte {}", self.reason, self.line, self.byte)
    }
}

impl From<&ParseDiagnostic> for Error {
    fn from(d: &ParseDiagnostic) -> Self {
        Self::Parse {
            line: d.line,
            byte: d.byte,
            reason: d.reason.clone(),
        }
    }
}
