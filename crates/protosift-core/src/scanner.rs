//! Scanning raw binaries for embedded descriptors.
//!
//! Compiled binaries that link protobuf runtimes carry each schema as a
//! serialized `FileDescriptorProto`, typically as a NUL-terminated C string
//! with no length prefix. Every descriptor starts with its file name: field 1,
//! wire type LEN, so byte `0x0A` followed by a length-prefixed path string.
//!
//! The scan alternates between two modes: seeking, where every `0x0A` byte is
//! a candidate and a failed candidate advances the cursor by one byte, and
//! matched, where a confirmed record moves the cursor past its entire span so
//! the record's interior is never re-scanned. Candidates are cheap-filtered on
//! the name string before the full decoder runs.

use crate::descriptor::{self, FileDescriptor};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, trace};

/// Gate byte opening every descriptor: field 1 (name), wire type LEN
const CANDIDATE_GATE: u8 = 0x0A;

/// Upper bound on a plausible descriptor file name
const MAX_NAME_LEN: usize = 512;

/// The well-known descriptor schema every protobuf runtime embeds
const WELL_KNOWN_DESCRIPTOR: &str = "google/protobuf/descriptor.proto";

/// One descriptor recovered from a byte stream
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// The decoded descriptor
    pub descriptor: FileDescriptor,
    /// The raw descriptor bytes
    pub data: Bytes,
    /// Byte range in the scanned input where the descriptor was found
    pub range: Range<usize>,
}

/// Outcome of scanning one byte stream
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Confirmed descriptors, in offset order
    pub results: Vec<ScanResult>,
    /// Candidates that looked like a descriptor name but failed to decode
    /// or fell outside the size filters
    pub candidates_rejected: usize,
}

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Maximum number of descriptors to find (0 = unlimited)
    pub max_results: usize,
    /// Minimum size for a valid descriptor (filters noise)
    pub min_descriptor_size: usize,
    /// Maximum size for a valid descriptor (filters garbage)
    pub max_descriptor_size: usize,
    /// Require candidate names to end in `.proto`
    pub require_proto_suffix: bool,
    /// Drop the embedded `google/protobuf/descriptor.proto` schema
    pub skip_well_known: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_results: 0,
            min_descriptor_size: 8,
            max_descriptor_size: 10 * 1024 * 1024, // 10 MB
            require_proto_suffix: true,
            skip_well_known: true,
        }
    }
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of results to return
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Sets the minimum descriptor size filter
    pub fn min_descriptor_size(mut self, size: usize) -> Self {
        self.min_descriptor_size = size;
        self
    }

    /// Sets the maximum descriptor size filter
    pub fn max_descriptor_size(mut self, size: usize) -> Self {
        self.max_descriptor_size = size;
        self
    }

    /// Sets whether candidate names must end in `.proto`
    pub fn require_proto_suffix(mut self, require: bool) -> Self {
        self.require_proto_suffix = require;
        self
    }

    /// Sets whether the well-known descriptor schema is dropped
    pub fn skip_well_known(mut self, skip: bool) -> Self {
        self.skip_well_known = skip;
        self
    }
}

/// Trait for implementing custom scanning strategies
pub trait ScanStrategy: Send + Sync {
    /// Scan the provided data for embedded descriptors
    fn scan(&self, data: &[u8]) -> Result<ScanReport>;
}

enum Candidate {
    Accepted(ScanResult),
    /// Passed the name prefilter but failed decoding or size filters
    Rejected,
    /// Did not even look like a descriptor name
    Noise,
}

/// Primary scanner for finding embedded descriptors
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    /// Creates a new scanner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Checks whether `start` opens a plausible descriptor: the gate byte, a
    /// bounded length varint, and a printable path-like name behind it.
    fn plausible_name(&self, data: &[u8], start: usize) -> bool {
        let after_gate = &data[start + 1..];
        let Ok((len, varint_len)) = descriptor::wire::decode_varint(after_gate) else {
            return false;
        };
        let len = len as usize;
        if len == 0 || len > MAX_NAME_LEN || varint_len + len > after_gate.len() {
            return false;
        }
        let name = &after_gate[varint_len..varint_len + len];
        if !name.iter().all(|&b| b.is_ascii_graphic()) {
            return false;
        }
        !self.config.require_proto_suffix || name.ends_with(b".proto")
    }

    fn try_candidate(&self, data: &[u8], start: usize) -> Candidate {
        if !self.plausible_name(data, start) {
            return Candidate::Noise;
        }

        // Bound the decoder's view so a garbage candidate cannot chew
        // through the whole remaining input.
        let window_end = data.len().min(start.saturating_add(self.config.max_descriptor_size));
        let window = &data[start..window_end];

        let (fd, consumed) = match descriptor::decode_prefix(window) {
            Ok(decoded) => decoded,
            Err(e) => {
                trace!(offset = start, error = %e, "candidate failed to decode");
                return Candidate::Rejected;
            }
        };
        if consumed < self.config.min_descriptor_size {
            trace!(offset = start, consumed, "candidate below minimum size");
            return Candidate::Rejected;
        }

        Candidate::Accepted(ScanResult {
            descriptor: fd,
            data: Bytes::copy_from_slice(&window[..consumed]),
            range: start..start + consumed,
        })
    }
}

impl ScanStrategy for Scanner {
    fn scan(&self, data: &[u8]) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let mut pos = 0;

        debug!("starting scan of {} bytes", data.len());

        while pos < data.len() {
            let Some(rel) = data[pos..].iter().position(|&b| b == CANDIDATE_GATE) else {
                break;
            };
            let start = pos + rel;

            match self.try_candidate(data, start) {
                Candidate::Accepted(result) => {
                    let end = result.range.end;
                    debug!(
                        file = %result.descriptor.name,
                        range = ?result.range,
                        "found descriptor"
                    );
                    if self.config.skip_well_known
                        && result.descriptor.name == WELL_KNOWN_DESCRIPTOR
                    {
                        debug!("skipping well-known descriptor schema");
                    } else {
                        report.results.push(result);
                        if self.config.max_results > 0
                            && report.results.len() >= self.config.max_results
                        {
                            break;
                        }
                    }
                    // Resume past the whole record
                    pos = end;
                }
                Candidate::Rejected => {
                    report.candidates_rejected += 1;
                    pos = start + 1;
                }
                Candidate::Noise => {
                    pos = start + 1;
                }
            }
        }

        debug!(
            found = report.results.len(),
            rejected = report.candidates_rejected,
            "scan complete"
        );
        Ok(report)
    }
}

/// Scan a file for embedded descriptors with the default configuration
pub fn scan_file(path: impl AsRef<Path>) -> Result<ScanReport> {
    scan_file_with_config(path, ScannerConfig::default())
}

/// Scan a file with custom configuration
pub fn scan_file_with_config(path: impl AsRef<Path>, config: ScannerConfig) -> Result<ScanReport> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Scanner::with_config(config).scan(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-encodes a minimal proto3 FileDescriptorProto: name, package,
    /// syntax.
    fn descriptor_bytes(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(0x0A);
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
        out.push(0x12); // field 2: package
        out.extend_from_slice(b"\x03pkg");
        out.push(0x62); // field 12: syntax
        out.extend_from_slice(b"\x06proto3");
        out
    }

    #[test]
    fn test_scan_empty_input() {
        let report = Scanner::new().scan(&[]).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.candidates_rejected, 0);
    }

    #[test]
    fn test_scan_no_gate_byte() {
        let report = Scanner::new().scan(b"nothing protobuf here").unwrap();
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_scan_descriptor_amid_noise() {
        let descriptor = descriptor_bytes("foo.proto");
        let mut data = vec![0xFF; 16];
        data.extend_from_slice(&descriptor);
        data.extend(vec![0xFF; 16]);

        let report = Scanner::new().scan(&data).unwrap();
        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.descriptor.name, "foo.proto");
        assert_eq!(result.descriptor.package, "pkg");
        assert_eq!(result.range, 16..16 + descriptor.len());
        assert_eq!(&result.data[..], &descriptor[..]);
    }

    #[test]
    fn test_scan_adjacent_descriptors() {
        let mut data = descriptor_bytes("a.proto");
        data.extend(descriptor_bytes("b.proto"));

        let report = Scanner::new().scan(&data).unwrap();
        let names: Vec<_> = report
            .results
            .iter()
            .map(|r| r.descriptor.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.proto", "b.proto"]);
    }

    #[test]
    fn test_scan_gate_byte_noise_rejected() {
        // A lone gate byte with printable garbage behind it passes the
        // prefilter sometimes but never decodes; the scan must move on.
        let mut data = vec![0x0A, 0x04];
        data.extend_from_slice(b"abcd");
        data.extend(vec![0x00; 8]);
        data.extend(descriptor_bytes("real.proto"));

        let report = Scanner::new().scan(&data).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].descriptor.name, "real.proto");
    }

    #[test]
    fn test_scan_skips_well_known_descriptor() {
        let mut data = descriptor_bytes("google/protobuf/descriptor.proto");
        data.extend(descriptor_bytes("mine.proto"));

        let report = Scanner::new().scan(&data).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].descriptor.name, "mine.proto");

        let config = ScannerConfig::new().skip_well_known(false);
        let report = Scanner::with_config(config).scan(&data).unwrap();
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn test_scan_proto_suffix_gate() {
        let data = descriptor_bytes("schema.txt");

        let report = Scanner::new().scan(&data).unwrap();
        assert!(report.results.is_empty());

        let config = ScannerConfig::new().require_proto_suffix(false);
        let report = Scanner::with_config(config).scan(&data).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].descriptor.name, "schema.txt");
    }

    #[test]
    fn test_scan_min_size_filter() {
        let data = descriptor_bytes("a.proto");
        let config = ScannerConfig::new().min_descriptor_size(1024);
        let report = Scanner::with_config(config).scan(&data).unwrap();
        assert!(report.results.is_empty());
        assert!(report.candidates_rejected >= 1);
    }

    #[test]
    fn test_scan_max_results_limit() {
        let mut data = Vec::new();
        for name in ["a.proto", "b.proto", "c.proto"] {
            data.extend(descriptor_bytes(name));
        }
        let config = ScannerConfig::new().max_results(2);
        let report = Scanner::with_config(config).scan(&data).unwrap();
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn test_scan_truncated_tail_never_panics() {
        let descriptor = descriptor_bytes("foo.proto");
        for cut in 0..descriptor.len() {
            let _ = Scanner::new().scan(&descriptor[..cut]);
        }
    }

    #[test]
    fn test_scanner_config_builder() {
        let config = ScannerConfig::new()
            .max_results(10)
            .min_descriptor_size(20)
            .max_descriptor_size(1000);
        assert_eq!(config.max_results, 10);
        assert_eq!(config.min_descriptor_size, 20);
        assert_eq!(config.max_descriptor_size, 1000);
    }

    #[test]
    fn test_scan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let mut data = vec![0u8; 32];
        data.extend(descriptor_bytes("disk.proto"));
        std::fs::write(&path, &data).unwrap();

        let report = scan_file(&path).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].descriptor.name, "disk.proto");

        assert!(scan_file(dir.path().join("missing.bin")).is_err());
    }
}
