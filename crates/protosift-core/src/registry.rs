//! Cross-file descriptor registry.
//!
//! The registry is the only component with cross-descriptor state: it collects
//! decoded [`FileDescriptor`]s, deduplicates them by file name, indexes every
//! declared message and enum under its fully qualified name, and answers
//! type-reference lookups using the protobuf scoping rules. It is an explicit,
//! scoped object constructed per scan invocation, never a process-wide
//! singleton; mutation is single-writer, and rendering only reads.

use crate::descriptor::{FileDescriptor, MessageDescriptor};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Outcome of registering one decoded descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First descriptor seen under this file name
    Inserted,
    /// Same name, structurally identical content; collapsed silently
    DuplicateIdentical,
    /// Same name, different content; handled per [`DuplicatePolicy`]
    DuplicateConflicting,
}

/// Policy for same-name, different-content descriptors.
///
/// Nothing in the serialized data says which copy is authoritative, so the
/// choice is explicit configuration rather than inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the first registration, discard later conflicting ones
    #[default]
    KeepFirst,
    /// Replace earlier registrations with the latest conflicting one
    KeepLast,
    /// Keep both, renaming the newcomer with its origin digest:
    /// `file~a1b2c3d4.proto`
    KeepBoth,
}

/// Where a descriptor was recovered from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    /// Name of the input byte stream (binary path, archive member, ...)
    pub source: String,
    /// Byte offset of the descriptor within that input
    pub offset: usize,
    /// Short content digest of the raw descriptor bytes
    pub digest: String,
}

/// Kind of a resolved type reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedKind {
    /// A message declaration
    Message,
    /// An enum declaration
    Enum,
}

/// Successful resolution of a qualified-name reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// Fully qualified name without the leading dot
    pub full_name: String,
    /// Name of the file declaring the type
    pub file: String,
    /// Message or enum
    pub kind: ResolvedKind,
}

/// Non-fatal events surfaced by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Two structurally different descriptors claimed the same file name
    DuplicateConflict {
        /// The contested file name
        name: String,
        /// Origin of the copy that stayed under the canonical name
        kept: Origin,
        /// Origin of the other copy (discarded or renamed, per policy)
        other: Origin,
    },
    /// A registered file imports a file nothing provided
    MissingImport {
        /// The importing file
        file: String,
        /// The import that resolved to no registered file
        import: String,
    },
    /// The import graph contains a cycle; ordering broke it arbitrarily
    ImportCycle {
        /// Files participating in the cycle, in registration order
        files: Vec<String>,
    },
}

struct Entry {
    fd: FileDescriptor,
    origin: Origin,
}

/// Collection of all recovered descriptors for one run
#[derive(Default)]
pub struct Registry {
    policy: DuplicatePolicy,
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
    /// Fully qualified type name -> (entry index, kind)
    symbols: HashMap<String, (usize, ResolvedKind)>,
    diagnostics: Vec<Diagnostic>,
}

impl Registry {
    /// Creates an empty registry with the default keep-first policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with the given duplicate policy
    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers one decoded descriptor.
    ///
    /// Identity is the file name. Identical re-registrations collapse
    /// silently; conflicting ones follow the configured policy and always
    /// leave a [`Diagnostic::DuplicateConflict`] behind.
    pub fn register(&mut self, fd: FileDescriptor, origin: Origin) -> RegisterOutcome {
        let Some(&existing_idx) = self.by_name.get(&fd.name) else {
            debug!(file = %fd.name, source = %origin.source, "registered descriptor");
            self.insert(fd, origin);
            return RegisterOutcome::Inserted;
        };

        if self.entries[existing_idx].fd == fd {
            return RegisterOutcome::DuplicateIdentical;
        }

        let kept_origin = self.entries[existing_idx].origin.clone();
        warn!(
            file = %fd.name,
            kept = %kept_origin.source,
            other = %origin.source,
            "conflicting descriptors under the same file name"
        );
        match self.policy {
            DuplicatePolicy::KeepFirst => {
                self.diagnostics.push(Diagnostic::DuplicateConflict {
                    name: fd.name.clone(),
                    kept: kept_origin,
                    other: origin,
                });
            }
            DuplicatePolicy::KeepLast => {
                self.diagnostics.push(Diagnostic::DuplicateConflict {
                    name: fd.name.clone(),
                    kept: origin.clone(),
                    other: kept_origin,
                });
                self.entries[existing_idx] = Entry { fd, origin };
                self.rebuild_symbols();
            }
            DuplicatePolicy::KeepBoth => {
                self.diagnostics.push(Diagnostic::DuplicateConflict {
                    name: fd.name.clone(),
                    kept: kept_origin,
                    other: origin.clone(),
                });
                let mut renamed = fd;
                renamed.name = disambiguate(&renamed.name, &origin.digest);
                if !self.by_name.contains_key(&renamed.name) {
                    self.insert(renamed, origin);
                }
            }
        }
        RegisterOutcome::DuplicateConflicting
    }

    fn insert(&mut self, fd: FileDescriptor, origin: Origin) {
        let idx = self.entries.len();
        self.by_name.insert(fd.name.clone(), idx);
        self.entries.push(Entry { fd, origin });
        self.index_symbols(idx);
    }

    fn index_symbols(&mut self, idx: usize) {
        let fd = &self.entries[idx].fd;
        let mut pending: Vec<(String, ResolvedKind)> = Vec::new();
        let prefix = fd.package.clone();
        for msg in &fd.message_type {
            collect_symbols(&prefix, msg, &mut pending);
        }
        for en in &fd.enum_type {
            pending.push((join_name(&prefix, &en.name), ResolvedKind::Enum));
        }
        for (name, kind) in pending {
            // First declaration wins; colliding symbols from later files are
            // not allowed to re-point existing references.
            self.symbols.entry(name).or_insert((idx, kind));
        }
    }

    fn rebuild_symbols(&mut self) {
        self.symbols.clear();
        for idx in 0..self.entries.len() {
            self.index_symbols(idx);
        }
    }

    /// Iterates registered files in registration order
    pub fn iter(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.entries.iter().map(|e| &e.fd)
    }

    /// Looks up a file by name
    pub fn get(&self, name: &str) -> Option<&FileDescriptor> {
        self.by_name.get(name).map(|&i| &self.entries[i].fd)
    }

    /// Diagnostics accumulated so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Resolves a type reference appearing in `from_file` at scope `scope`
    /// (the fully qualified name of the enclosing message, or the package for
    /// file-level references).
    ///
    /// A leading dot skips the scope search and resolves directly from the
    /// root namespace. Otherwise the reference is tried against each scope
    /// from the innermost outward; first match wins. Only types declared in
    /// `from_file` itself, its direct imports, or files reachable through
    /// `import public` edges of those imports are visible.
    pub fn resolve(&self, from_file: &str, scope: &str, reference: &str) -> Option<ResolvedType> {
        if reference.is_empty() {
            return None;
        }
        let visible = self.visible_files(from_file);

        if let Some(absolute) = reference.strip_prefix('.') {
            return self.lookup_visible(absolute, &visible);
        }

        let mut scope_cur = scope.to_string();
        loop {
            let candidate = join_name(&scope_cur, reference);
            if let Some(resolved) = self.lookup_visible(&candidate, &visible) {
                return Some(resolved);
            }
            match scope_cur.rfind('.') {
                Some(pos) => scope_cur.truncate(pos),
                None if !scope_cur.is_empty() => scope_cur.clear(),
                None => return None,
            }
        }
    }

    fn lookup_visible(&self, full_name: &str, visible: &HashSet<usize>) -> Option<ResolvedType> {
        let &(idx, kind) = self.symbols.get(full_name)?;
        if !visible.contains(&idx) {
            return None;
        }
        Some(ResolvedType {
            full_name: full_name.to_string(),
            file: self.entries[idx].fd.name.clone(),
            kind,
        })
    }

    /// The set of entry indices visible from `from_file`: the file itself,
    /// its direct imports, and the transitive closure of `import public`
    /// edges beyond those.
    fn visible_files(&self, from_file: &str) -> HashSet<usize> {
        let mut visible = HashSet::new();
        let Some(&start) = self.by_name.get(from_file) else {
            return visible;
        };
        visible.insert(start);

        let mut queue: Vec<(usize, bool)> = self.entries[start]
            .fd
            .dependency
            .iter()
            .filter_map(|d| self.by_name.get(d).copied())
            .map(|i| (i, false))
            .collect();

        while let Some((idx, _via_public)) = queue.pop() {
            if !visible.insert(idx) {
                continue;
            }
            let fd = &self.entries[idx].fd;
            for &pub_idx in &fd.public_dependency {
                let Some(dep_name) = fd.dependency.get(pub_idx as usize) else {
                    continue;
                };
                if let Some(&dep) = self.by_name.get(dep_name) {
                    queue.push((dep, true));
                }
            }
        }
        visible
    }

    /// Finds the message declaration for a fully qualified name (no leading
    /// dot). Used by the renderer to inspect map-entry messages.
    pub fn message_by_name(&self, full_name: &str) -> Option<&MessageDescriptor> {
        let &(idx, kind) = self.symbols.get(full_name)?;
        if kind != ResolvedKind::Message {
            return None;
        }
        let fd = &self.entries[idx].fd;
        let relative = if fd.package.is_empty() {
            full_name
        } else {
            full_name
                .strip_prefix(fd.package.as_str())?
                .strip_prefix('.')?
        };
        let mut components = relative.split('.');
        let first = components.next()?;
        let mut current = fd.message_type.iter().find(|m| m.name == first)?;
        for component in components {
            current = current.nested_type.iter().find(|m| m.name == component)?;
        }
        Some(current)
    }

    /// Returns all files ordered so that imports come before importers, with
    /// cycle and missing-import reports. Files inside a cycle keep their
    /// registration order, breaking the cycle arbitrarily.
    pub fn ordered_files(&self) -> FileOrder<'_> {
        let n = self.entries.len();
        let mut missing_imports = Vec::new();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];

        for (idx, entry) in self.entries.iter().enumerate() {
            for dep in &entry.fd.dependency {
                match self.by_name.get(dep) {
                    Some(&dep_idx) => {
                        dependents[dep_idx].push(idx);
                        indegree[idx] += 1;
                    }
                    None => missing_imports.push(Diagnostic::MissingImport {
                        file: entry.fd.name.clone(),
                        import: dep.clone(),
                    }),
                }
            }
        }

        // Kahn's algorithm with a sorted frontier keeps the order
        // deterministic across runs.
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];
        while let Some(idx) = ready.first().copied() {
            ready.remove(0);
            placed[idx] = true;
            order.push(idx);
            for &dependent in &dependents[idx] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    let pos = ready.partition_point(|&r| r < dependent);
                    ready.insert(pos, dependent);
                }
            }
        }

        let mut cycles = Vec::new();
        if order.len() < n {
            let stuck: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
            cycles.push(Diagnostic::ImportCycle {
                files: stuck
                    .iter()
                    .map(|&i| self.entries[i].fd.name.clone())
                    .collect(),
            });
            order.extend(stuck);
        }

        FileOrder {
            files: order.iter().map(|&i| &self.entries[i].fd).collect(),
            cycles,
            missing_imports,
        }
    }
}

/// Result of [`Registry::ordered_files`]
pub struct FileOrder<'a> {
    /// Files in dependency-first order
    pub files: Vec<&'a FileDescriptor>,
    /// Cycle reports, if the import graph was not a DAG
    pub cycles: Vec<Diagnostic>,
    /// Imports that matched no registered file
    pub missing_imports: Vec<Diagnostic>,
}

fn collect_symbols(prefix: &str, msg: &MessageDescriptor, out: &mut Vec<(String, ResolvedKind)>) {
    let full = join_name(prefix, &msg.name);
    out.push((full.clone(), ResolvedKind::Message));
    for nested in &msg.nested_type {
        collect_symbols(&full, nested, out);
    }
    for en in &msg.enum_type {
        out.push((join_name(&full, &en.name), ResolvedKind::Enum));
    }
}

fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Inserts a suffix before the `.proto` extension:
/// `dup.proto` + `a1b2c3d4` -> `dup~a1b2c3d4.proto`.
fn disambiguate(filename: &str, digest: &str) -> String {
    let tag = if digest.is_empty() { "conflict" } else { digest };
    if let Some(stem) = filename.strip_suffix(".proto") {
        format!("{stem}~{tag}.proto")
    } else {
        format!("{filename}~{tag}")
    }
}
