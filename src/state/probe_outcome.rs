//! Probe outcome definitions for the discovery pass
//!
//! Every probe ends in exactly one of these outcomes, which decides what is
//! buffered, whether the checkpoint may advance, and how the failure breaker
//! is fed.

use std::fmt;

/// Represents the result of probing one candidate identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    // ===== Benign Outcomes =====
    /// The remote host reported that the document does not exist
    NotFound,

    /// The document exists but matched an exclusion rule
    Irrelevant(String),

    // ===== Success =====
    /// The document exists and is worth retrieving
    Relevant(String),

    // ===== Faults =====
    /// Network failure, timeout or unexpected status
    TransientError(String),

    /// The document was fetched but its content cannot be used
    FatalContentError(String),
}

impl ProbeOutcome {
    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Irrelevant(_) => "irrelevant",
            Self::Relevant(_) => "relevant",
            Self::TransientError(_) => "transient_error",
            Self::FatalContentError(_) => "content_error",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Irrelevant(title) | Self::Relevant(title) => {
                write!(f, "{} ({})", self.label(), title)
            }
            Self::TransientError(msg) | Self::FatalContentError(msg) => {
                write!(f, "{}: {}", self.label(), msg)
            }
            Self::NotFound => write!(f, "{}", self.label()),
        }
    }
}
