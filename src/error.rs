//! Error types for the BER codec and the session/transport layer.
//!
//! Codec failures are precise and recoverable per-chunk; session failures
//! are configuration or transport-level and generally terminal for a
//! single call. Application code that aggregates both (the CLI, tests)
//! is expected to use `anyhow::Result` with `.context(...)`.

use thiserror::Error;

/// Failures from BER encoding, decoding, and OID parsing.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CodecError {
    #[error("fewer than 2 octets remain while reading a chunk")]
    UnexpectedEof,

    #[error("declared length {declared} exceeds {remaining} remaining octets")]
    LengthOverflow { declared: usize, remaining: usize },

    #[error("OID text {0:?} does not start with the required .1.3 prefix")]
    InvalidOid(String),

    #[error("OID sub-identifier {0} exceeds the 31-bit limit")]
    OidComponentTooLarge(u32),
}

/// Failures from session configuration and transport.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("response timeout must be positive, got {0} ms")]
    InvalidTimeout(i64),

    #[error("community string must not be empty")]
    EmptyCommunity,

    #[error("I/O error talking to the agent")]
    Io(#[from] std::io::Error),
}
