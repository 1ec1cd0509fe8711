//! Error types for netposture
//!
//! This module defines the error hierarchy for the rule evaluator. Errors
//! are categorized by concern: parsing of textual address/port expressions,
//! and evaluation-time configuration problems. An `Unknown` verdict is never
//! an error; it is a first-class [`crate::TriState`] value.

use thiserror::Error;

/// Top-level error type for netposture
#[derive(Debug, Error)]
pub enum NetPostureError {
    /// Address/port expression parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Evaluation-time configuration errors
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// Errors produced while parsing textual address or port expressions
///
/// Malformed input is always a hard parse failure, never a silently empty
/// or wildcard set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Not a valid dotted-quad address
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    /// Not a valid CIDR block
    #[error("invalid CIDR block: {0:?}")]
    InvalidCidr(String),

    /// Range with unparseable bounds or begin > end
    #[error("invalid address range: {0:?}")]
    InvalidAddressRange(String),

    /// Not a valid port number (0-65535)
    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    /// Port range with begin > end
    #[error("invalid port range: {begin}-{end}")]
    InvalidPortRange { begin: u16, end: u16 },

    /// Not a recognized protocol name
    #[error("invalid protocol: {0:?}")]
    InvalidProtocol(String),

    /// Empty expression or empty segment in a comma list
    #[error("empty segment in expression {0:?}")]
    EmptySegment(String),

    /// A special keyword cannot appear inside a comma list
    #[error("special keyword {0:?} cannot appear in a list")]
    SpecialInList(String),
}

impl ParseError {
    /// Create an invalid-address error
    pub fn invalid_address(text: impl Into<String>) -> Self {
        Self::InvalidAddress(text.into())
    }

    /// Create an invalid-port error
    pub fn invalid_port(text: impl Into<String>) -> Self {
        Self::InvalidPort(text.into())
    }
}

/// Errors surfaced by the rule-evaluation engines
///
/// These are configuration problems distinct from any verdict: a
/// `False`/`Unknown`/`NotApplicable` result is a valid answer, while an
/// `EvalError` means the question itself was malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    /// The whitelist defines neither an all-ports set nor a per-port map
    #[error("whitelist defines neither an all-ports address set nor a per-port map")]
    BadWhitelist,

    /// Rule data is internally inconsistent
    #[error("inconsistent rule data: {0}")]
    InconsistentRules(String),
}

/// Type alias for Result with `NetPostureError`
pub type Result<T> = std::result::Result<T, NetPostureError>;
