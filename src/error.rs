//! Crate-level error type.
//!
//! Numerical routines report degenerate input through `Option` and solver
//! outcomes through their result structs; [`Error`] covers the remaining
//! fallible surface: selector parsing and loading coefficient traces.

use std::path::PathBuf;

use crate::distributions::DistributionError;

/// Errors produced at the string and file boundaries of the crate.
#[derive(Debug)]
pub enum Error {
    /// A fit-mode selector that is not one of the known spellings.
    UnknownFitMode(String),
    /// A mass-radius relation selector that is not one of the known spellings.
    UnknownVariant(String),
    /// Reading a trace file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A trace file row could not be parsed. `line` is 1-based.
    Parse { line: usize, message: String },
    /// A required column is absent from the trace header.
    MissingColumn { name: String, found: Vec<String> },
    /// The coefficient columns are empty, of unequal length, or non-finite.
    InvalidTrace(String),
    /// Scatter magnitude must be finite and non-negative.
    InvalidScatter(f64),
    /// Invalid distribution parameters.
    Distribution(DistributionError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownFitMode(s) => {
                write!(f, "unknown fit mode {s:?} (expected Peak, Med, Med2 or SF)")
            }
            Error::UnknownVariant(s) => {
                write!(f, "unknown relation variant {s:?} (expected Frac or Line)")
            }
            Error::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            Error::Parse { line, message } => write!(f, "line {line}: {message}"),
            Error::MissingColumn { name, found } => {
                write!(f, "column {name:?} not found (header: {})", found.join(", "))
            }
            Error::InvalidTrace(msg) => write!(f, "invalid coefficient trace: {msg}"),
            Error::InvalidScatter(k) => {
                write!(f, "scatter magnitude must be finite and non-negative, got {k}")
            }
            Error::Distribution(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Distribution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DistributionError> for Error {
    fn from(e: DistributionError) -> Self {
        Error::Distribution(e)
    }
}
