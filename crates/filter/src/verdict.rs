//! Pipeline outcomes.

use std::fmt;

/// The ternary admission verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward to the mesh and deliver locally.
    Accept,
    /// Drop silently; the peer is not penalized.
    Ignore,
    /// Drop and apply a peer-scoring penalty.
    Reject,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => write!(f, "accept"),
            Verdict::Ignore => write!(f, "ignore"),
            Verdict::Reject => write!(f, "reject"),
        }
    }
}

/// Why a verdict was produced. One label per counter bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    NoData,
    Encoding,
    NoValidator,
    SyntacticCheck,
    NotTimely,
    InvalidSig,
    BetterMessage,
    Valid,
}

impl ValidationReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            ValidationReason::NoData => "no_data",
            ValidationReason::Encoding => "encoding",
            ValidationReason::NoValidator => "no_validator",
            ValidationReason::SyntacticCheck => "syntactic_check",
            ValidationReason::NotTimely => "not_timely",
            ValidationReason::InvalidSig => "invalid_sig",
            ValidationReason::BetterMessage => "better_message",
            ValidationReason::Valid => "valid",
        }
    }
}
