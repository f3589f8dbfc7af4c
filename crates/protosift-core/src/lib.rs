//! # protosift-core
//!
//! A library for recovering Protocol Buffer definitions from compiled
//! binaries.
//!
//! Binaries built against protobuf runtimes embed each schema as a serialized
//! `FileDescriptorProto`. This crate finds those records, decodes them against
//! the fixed descriptor schema, links the recovered files into a registry, and
//! renders them back to `.proto` source text.
//!
//! ## Architecture
//!
//! - [`scanner`]: Candidate scanning over raw byte streams
//! - [`descriptor`]: The descriptor model and its wire-format decoder
//! - [`registry`]: Cross-file collection, deduplication, and name resolution
//! - [`render`]: Deterministic `.proto` source emission
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use protosift_core::{render_file, Origin, Registry, ScanStrategy, Scanner};
//! use std::fs;
//!
//! let data = fs::read("./target/release/my_app")?;
//!
//! let report = Scanner::new().scan(&data)?;
//! let mut registry = Registry::new();
//! for result in report.results {
//!     registry.register(result.descriptor, Origin::default());
//! }
//!
//! for fd in registry.ordered_files().files {
//!     let rendered = render_file(fd, &registry);
//!     println!("// {}\n{}", rendered.path, rendered.source);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod descriptor;
pub mod error;
pub mod registry;
pub mod render;
pub mod scanner;

// Re-export primary types for convenience
pub use descriptor::{decode_prefix, FileDescriptor, Syntax, MAX_RECURSION_DEPTH};
pub use error::{Error, Result};
pub use registry::{
    Diagnostic, DuplicatePolicy, FileOrder, Origin, RegisterOutcome, Registry, ResolvedKind,
    ResolvedType,
};
pub use render::{render_file, render_file_with_config, RenderConfig, Rendered};
pub use scanner::{ScanReport, ScanResult, ScanStrategy, Scanner, ScannerConfig};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
/// Used for `reserved X to max` ranges
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
