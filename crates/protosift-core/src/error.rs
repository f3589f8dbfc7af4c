//! Error types for the protosift-core library.
//!
//! Decode-level failures are ordinary data for this crate: a candidate offset
//! that turns out not to hold a descriptor produces a recoverable [`Error`]
//! and scanning moves on. Only I/O problems are treated as fatal by callers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for protosift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all protosift operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid protobuf wire format
    #[error("invalid wire format at offset {offset}: {details}")]
    InvalidWireFormat {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// A length prefix points past the end of the buffer
    #[error("truncated input at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        /// Byte offset of the field whose payload is cut off
        offset: usize,
        /// Bytes the length prefix promised
        needed: usize,
        /// Bytes actually remaining
        available: usize,
    },

    /// Invalid field number in a wire tag
    #[error("invalid field number {number}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },

    /// Nested messages exceed the bounded decode depth
    #[error("descriptor nesting exceeds maximum depth of {max_depth}")]
    RecursionLimit {
        /// The configured depth bound
        max_depth: usize,
    },

    /// Decoded cleanly but violates a structural invariant
    #[error("structural invariant violation: {details}")]
    StructuralViolation {
        /// Which invariant failed, and where
        details: String,
    },

    /// Unsupported proto syntax version
    #[error("unsupported proto syntax: '{syntax}'")]
    UnsupportedSyntax {
        /// The unsupported syntax string
        syntax: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new wire format error
    pub fn invalid_wire_format(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidWireFormat {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new truncation error
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::Truncated {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new structural invariant violation
    pub fn structural(details: impl Into<String>) -> Self {
        Self::StructuralViolation {
            details: details.into(),
        }
    }

    /// Returns true if this is a recoverable error: the bytes at one candidate
    /// offset were not a descriptor, but scanning may continue elsewhere.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::FileRead { .. })
    }
}
