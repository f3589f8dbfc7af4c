//! Rendering of recovered descriptors back into `.proto` source text.
//!
//! Rendering is a pure function of the descriptor and the registry snapshot:
//! identical inputs always produce byte-identical text, and declaration order
//! in the output follows declaration order in the descriptor. The two
//! compiler desugarings are inverted here: synthetic map-entry messages
//! collapse back into `map<K, V>` fields, and fields sharing a oneof index
//! are re-nested under their `oneof` block.

use crate::descriptor::{
    EnumDescriptor, FieldDescriptor, FieldType, FileDescriptor, Label, MessageDescriptor,
    ServiceDescriptor, Syntax, UnknownValue,
};
use crate::registry::Registry;
use crate::MAX_FIELD_NUMBER;
use std::fmt::Write as FmtWrite;
use tracing::warn;

/// Configuration for rendering
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
        }
    }
}

/// A type reference the registry could not resolve.
///
/// The field still renders, using the reference text as written, so the
/// output stays best-effort usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Fully qualified name of the field carrying the reference
    pub field: String,
    /// The reference that did not resolve
    pub type_name: String,
}

/// One rendered output file
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Relative output path, taken verbatim from the descriptor name
    pub path: String,
    /// The `.proto` source text
    pub source: String,
    /// References that failed to resolve during rendering
    pub unresolved: Vec<UnresolvedReference>,
}

/// Renders one descriptor with registry context for name resolution.
pub fn render_file(fd: &FileDescriptor, registry: &Registry) -> Rendered {
    render_file_with_config(fd, registry, &RenderConfig::default())
}

/// Renders one descriptor with a custom configuration.
pub fn render_file_with_config(
    fd: &FileDescriptor,
    registry: &Registry,
    config: &RenderConfig,
) -> Rendered {
    let mut renderer = Renderer {
        fd,
        registry,
        config,
        out: String::new(),
        indent_level: 0,
        unresolved: Vec::new(),
    };
    renderer.file().expect("String write cannot fail");
    for unresolved in &renderer.unresolved {
        warn!(
            file = %fd.name,
            field = %unresolved.field,
            reference = %unresolved.type_name,
            "type reference did not resolve"
        );
    }
    Rendered {
        path: fd.name.clone(),
        source: renderer.out,
        unresolved: renderer.unresolved,
    }
}

struct Renderer<'a> {
    fd: &'a FileDescriptor,
    registry: &'a Registry,
    config: &'a RenderConfig,
    out: String,
    indent_level: usize,
    unresolved: Vec<UnresolvedReference>,
}

impl Renderer<'_> {
    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> std::fmt::Result {
        for _ in 0..self.indent_level {
            self.out.push_str(&self.config.indent_str);
        }
        Ok(())
    }

    fn writeln(&mut self, s: &str) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.out, "{}", s)
    }

    fn file(&mut self) -> std::fmt::Result {
        writeln!(self.out, "syntax = \"{}\";", self.fd.syntax.as_str())?;

        if !self.fd.package.is_empty() {
            writeln!(self.out, "\npackage {};", self.fd.package)?;
        }

        self.imports()?;
        self.file_options()?;

        let package = self.fd.package.clone();
        for message in &self.fd.message_type {
            if message.is_map_entry() {
                continue;
            }
            self.out.push('\n');
            self.message(message, &package)?;
        }
        for en in &self.fd.enum_type {
            self.out.push('\n');
            self.enumeration(en)?;
        }
        for service in &self.fd.service {
            self.out.push('\n');
            self.service(service)?;
        }
        for (extendee, extensions) in group_by_extendee(&self.fd.extension) {
            self.out.push('\n');
            self.extend_block(extendee, &extensions, &package)?;
        }

        Ok(())
    }

    fn imports(&mut self) -> std::fmt::Result {
        if self.fd.dependency.is_empty() {
            return Ok(());
        }
        self.out.push('\n');
        for (i, dep) in self.fd.dependency.iter().enumerate() {
            let i = i as i32;
            let modifier = if self.fd.public_dependency.contains(&i) {
                "public "
            } else if self.fd.weak_dependency.contains(&i) {
                "weak "
            } else {
                ""
            };
            writeln!(self.out, "import {}\"{}\";", modifier, dep)?;
        }
        Ok(())
    }

    fn file_options(&mut self) -> std::fmt::Result {
        let opts = &self.fd.options;
        let mut lines: Vec<String> = Vec::new();

        let string_option = |name: &str, value: &Option<String>, lines: &mut Vec<String>| {
            if let Some(v) = value {
                if !v.is_empty() {
                    lines.push(format!("option {} = \"{}\";", name, escape_string(v)));
                }
            }
        };
        let bool_option = |name: &str, value: &Option<bool>, lines: &mut Vec<String>| {
            if let Some(v) = value {
                lines.push(format!("option {} = {};", name, v));
            }
        };

        string_option("java_package", &opts.java_package, &mut lines);
        string_option("java_outer_classname", &opts.java_outer_classname, &mut lines);
        bool_option("java_multiple_files", &opts.java_multiple_files, &mut lines);
        bool_option("java_string_check_utf8", &opts.java_string_check_utf8, &mut lines);
        if let Some(mode) = opts.optimize_for {
            lines.push(format!("option optimize_for = {};", mode.as_str()));
        }
        string_option("go_package", &opts.go_package, &mut lines);
        bool_option("deprecated", &opts.deprecated, &mut lines);
        bool_option("cc_enable_arenas", &opts.cc_enable_arenas, &mut lines);
        string_option("objc_class_prefix", &opts.objc_class_prefix, &mut lines);
        string_option("csharp_namespace", &opts.csharp_namespace, &mut lines);
        string_option("swift_prefix", &opts.swift_prefix, &mut lines);
        string_option("php_class_prefix", &opts.php_class_prefix, &mut lines);
        string_option("php_namespace", &opts.php_namespace, &mut lines);
        string_option("php_metadata_namespace", &opts.php_metadata_namespace, &mut lines);
        string_option("ruby_package", &opts.ruby_package, &mut lines);

        // Unrecognized option field numbers render in raw extension form so
        // the information survives, even though the extension name is lost.
        for unknown in &opts.unknown {
            let value = match &unknown.value {
                UnknownValue::Varint(v) => v.to_string(),
                UnknownValue::Fixed32(v) => v.to_string(),
                UnknownValue::Fixed64(v) => v.to_string(),
                UnknownValue::Bytes(b) => {
                    format!("\"{}\"", escape_string(&String::from_utf8_lossy(b)))
                }
            };
            lines.push(format!("option (field_{}) = {};", unknown.number, value));
        }

        if !lines.is_empty() {
            self.out.push('\n');
            for line in lines {
                writeln!(self.out, "{}", line)?;
            }
        }
        Ok(())
    }

    fn message(&mut self, message: &MessageDescriptor, scope: &str) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.out, "message {} {{", message.name)?;
        self.indent();

        if message.options.deprecated {
            self.writeln("option deprecated = true;")?;
        }

        let inner_scope = join_scope(scope, &message.name);

        for nested in &message.nested_type {
            // Map entries are synthetic; they re-emerge as map<K, V> fields
            if nested.is_map_entry() {
                continue;
            }
            self.message(nested, &inner_scope)?;
        }
        for en in &message.enum_type {
            self.enumeration(en)?;
        }

        // Fields in declaration order; a oneof block is emitted in place of
        // its first member and absorbs the rest.
        let mut emitted_oneofs: Vec<i32> = Vec::new();
        for field in &message.field {
            match field.oneof_index {
                Some(idx) if !self.is_synthetic_oneof(field, message) => {
                    if !emitted_oneofs.contains(&idx) {
                        emitted_oneofs.push(idx);
                        self.oneof(message, idx, &inner_scope)?;
                    }
                }
                _ => self.field(field, message, &inner_scope, false)?,
            }
        }

        for range in &message.extension_range {
            self.write_indent()?;
            let end = if range.end == MAX_FIELD_NUMBER as i32 + 1 {
                "max".to_string()
            } else {
                (range.end - 1).to_string()
            };
            writeln!(self.out, "extensions {} to {};", range.start, end)?;
        }
        self.reserved_ranges(&message.reserved_range, false)?;
        self.reserved_names(&message.reserved_name)?;

        for (extendee, extensions) in group_by_extendee(&message.extension) {
            self.extend_block(extendee, &extensions, &inner_scope)?;
        }

        self.dedent();
        self.writeln("}")?;
        Ok(())
    }

    /// Proto3 `optional` fields are backed by a single-member synthetic oneof;
    /// those never render as oneof blocks. Older descriptors predate the
    /// `proto3_optional` flag, so an underscore-named oneof whose sole member
    /// is this field is treated the same way. A user-declared oneof may also
    /// start with an underscore, but it holds more than one field.
    fn is_synthetic_oneof(&self, field: &FieldDescriptor, message: &MessageDescriptor) -> bool {
        if field.proto3_optional {
            return true;
        }
        let Some(idx) = field.oneof_index else {
            return false;
        };
        let underscore_named = message
            .oneof_decl
            .get(idx as usize)
            .map(|name| name.starts_with('_'))
            .unwrap_or(false);
        underscore_named
            && message
                .field
                .iter()
                .filter(|f| f.oneof_index == Some(idx))
                .count()
                == 1
    }

    fn oneof(&mut self, message: &MessageDescriptor, idx: i32, scope: &str) -> std::fmt::Result {
        let name = message
            .oneof_decl
            .get(idx as usize)
            .map(String::as_str)
            .unwrap_or("unnamed");
        self.write_indent()?;
        writeln!(self.out, "oneof {} {{", name)?;
        self.indent();
        for field in &message.field {
            if field.oneof_index == Some(idx) {
                self.field(field, message, scope, true)?;
            }
        }
        self.dedent();
        self.writeln("}")?;
        Ok(())
    }

    fn field(
        &mut self,
        field: &FieldDescriptor,
        message: &MessageDescriptor,
        scope: &str,
        in_oneof: bool,
    ) -> std::fmt::Result {
        // Map-entry inversion: a repeated field whose type is a synthetic
        // map-entry message renders as map<K, V> with no label.
        if let Some((key, value)) = self.map_entry_for(field) {
            let key_type = self.type_string(&key, scope).0;
            let (value_type, _) = self.type_string(&value, scope);
            self.write_indent()?;
            writeln!(
                self.out,
                "map<{}, {}> {} = {};",
                key_type, value_type, field.name, field.number
            )?;
            return Ok(());
        }

        self.write_indent()?;
        let label = self.field_label(field, message, in_oneof);
        if !label.is_empty() {
            write!(self.out, "{} ", label)?;
        }

        let (type_str, resolved) = self.type_string(field, scope);
        write!(self.out, "{} {} = {}", type_str, field.name, field.number)?;
        self.field_option_bracket(field)?;
        write!(self.out, ";")?;
        if !resolved {
            // Non-fatal: keep the output usable, flag the reference inline
            write!(self.out, " // unresolved")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn field_label(
        &self,
        field: &FieldDescriptor,
        message: &MessageDescriptor,
        in_oneof: bool,
    ) -> &'static str {
        if in_oneof {
            // Oneof members are always singular
            return "";
        }
        match field.label {
            Label::Repeated => "repeated",
            Label::Required => "required",
            Label::Optional => match self.fd.syntax {
                Syntax::Proto2 => "optional",
                Syntax::Proto3 => {
                    if self.is_synthetic_oneof(field, message) {
                        "optional"
                    } else {
                        ""
                    }
                }
            },
        }
    }

    /// Resolves a field to its map-entry message, if it is a map field.
    fn map_entry_for(
        &self,
        field: &FieldDescriptor,
    ) -> Option<(FieldDescriptor, FieldDescriptor)> {
        if field.label != Label::Repeated || field.field_type != FieldType::Message {
            return None;
        }
        let reference = field.type_name.as_deref()?;
        let resolved = self
            .registry
            .resolve(&self.fd.name, &self.current_scope_hint(reference), reference)?;
        let entry = self.registry.message_by_name(&resolved.full_name)?;
        let (key, value) = entry.map_entry_fields()?;
        Some((key.clone(), value.clone()))
    }

    /// Compiler-emitted map-entry references are always absolute, so scope is
    /// irrelevant; for relative references fall back to the package.
    fn current_scope_hint(&self, reference: &str) -> String {
        if reference.starts_with('.') {
            String::new()
        } else {
            self.fd.package.clone()
        }
    }

    /// Returns the rendered type and whether the reference resolved.
    fn type_string(&mut self, field: &FieldDescriptor, scope: &str) -> (String, bool) {
        if let Some(scalar) = field.field_type.scalar_name() {
            return (scalar.to_string(), true);
        }
        let Some(reference) = field.type_name.as_deref() else {
            self.unresolved.push(UnresolvedReference {
                field: join_scope(scope, &field.name),
                type_name: String::new(),
            });
            return ("UnknownType".to_string(), false);
        };
        match self.registry.resolve(&self.fd.name, scope, reference) {
            Some(resolved) => (self.shortest_reference(scope, &resolved.full_name), true),
            None => {
                self.unresolved.push(UnresolvedReference {
                    field: join_scope(scope, &field.name),
                    type_name: reference.to_string(),
                });
                (reference.to_string(), false)
            }
        }
    }

    /// Picks the shortest suffix of the fully qualified name that still
    /// resolves, from this scope, back to the same declaration. Falls back to
    /// the leading-dot absolute form, which cannot be shadowed.
    fn shortest_reference(&self, scope: &str, target: &str) -> String {
        let components: Vec<&str> = target.split('.').collect();
        for take in 1..=components.len() {
            let candidate = components[components.len() - take..].join(".");
            if let Some(resolved) = self.registry.resolve(&self.fd.name, scope, &candidate) {
                if resolved.full_name == target {
                    return candidate;
                }
            }
        }
        format!(".{target}")
    }

    fn field_option_bracket(&mut self, field: &FieldDescriptor) -> std::fmt::Result {
        let mut options = Vec::new();

        // Explicit defaults exist only under proto2
        if self.fd.syntax == Syntax::Proto2 {
            if let Some(default) = &field.default_value {
                let formatted = match field.field_type {
                    FieldType::String | FieldType::Bytes => {
                        format!("\"{}\"", escape_string(default))
                    }
                    _ => default.clone(),
                };
                options.push(format!("default = {}", formatted));
            }
        }

        if let Some(json_name) = &field.json_name {
            if json_name != &to_lower_camel_case(&field.name) {
                options.push(format!("json_name = \"{}\"", json_name));
            }
        }
        if let Some(packed) = field.options.packed {
            options.push(format!("packed = {}", packed));
        }
        if field.options.deprecated {
            options.push("deprecated = true".to_string());
        }

        if !options.is_empty() {
            write!(self.out, " [{}]", options.join(", "))?;
        }
        Ok(())
    }

    fn enumeration(&mut self, en: &EnumDescriptor) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.out, "enum {} {{", en.name)?;
        self.indent();

        if en.allow_alias {
            self.writeln("option allow_alias = true;")?;
        }
        if en.deprecated {
            self.writeln("option deprecated = true;")?;
        }

        for value in &en.value {
            self.write_indent()?;
            write!(self.out, "{} = {}", value.name, value.number)?;
            if value.deprecated {
                write!(self.out, " [deprecated = true]")?;
            }
            writeln!(self.out, ";")?;
        }

        self.reserved_ranges(&en.reserved_range, true)?;
        self.reserved_names(&en.reserved_name)?;

        self.dedent();
        self.writeln("}")?;
        Ok(())
    }

    /// Message ranges are end-exclusive on the wire, enum ranges inclusive.
    fn reserved_ranges(
        &mut self,
        ranges: &[crate::descriptor::NumberRange],
        inclusive: bool,
    ) -> std::fmt::Result {
        if ranges.is_empty() {
            return Ok(());
        }
        self.write_indent()?;
        write!(self.out, "reserved ")?;
        for (i, range) in ranges.iter().enumerate() {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            let last = if inclusive { range.end } else { range.end - 1 };
            if range.start == last {
                write!(self.out, "{}", range.start)?;
            } else {
                let max_last = if inclusive {
                    i32::MAX
                } else {
                    MAX_FIELD_NUMBER as i32
                };
                if last >= max_last {
                    write!(self.out, "{} to max", range.start)?;
                } else {
                    write!(self.out, "{} to {}", range.start, last)?;
                }
            }
        }
        writeln!(self.out, ";")?;
        Ok(())
    }

    fn reserved_names(&mut self, names: &[String]) -> std::fmt::Result {
        if names.is_empty() {
            return Ok(());
        }
        self.write_indent()?;
        write!(self.out, "reserved ")?;
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            write!(self.out, "\"{}\"", name)?;
        }
        writeln!(self.out, ";")?;
        Ok(())
    }

    fn service(&mut self, service: &ServiceDescriptor) -> std::fmt::Result {
        writeln!(self.out, "service {} {{", service.name)?;
        self.indent();
        let scope = self.fd.package.clone();
        for method in &service.method {
            let input = self.method_type(&method.input_type, &method.name, &scope);
            let output = self.method_type(&method.output_type, &method.name, &scope);
            let input = if method.client_streaming {
                format!("stream {input}")
            } else {
                input
            };
            let output = if method.server_streaming {
                format!("stream {output}")
            } else {
                output
            };
            self.write_indent()?;
            writeln!(self.out, "rpc {}({}) returns ({});", method.name, input, output)?;
        }
        self.dedent();
        self.writeln("}")?;
        Ok(())
    }

    fn method_type(&mut self, reference: &str, method: &str, scope: &str) -> String {
        match self.registry.resolve(&self.fd.name, scope, reference) {
            Some(resolved) => self.shortest_reference(scope, &resolved.full_name),
            None => {
                self.unresolved.push(UnresolvedReference {
                    field: method.to_string(),
                    type_name: reference.to_string(),
                });
                reference.to_string()
            }
        }
    }

    fn extend_block(
        &mut self,
        extendee: &str,
        extensions: &[&FieldDescriptor],
        scope: &str,
    ) -> std::fmt::Result {
        let target = match self.registry.resolve(&self.fd.name, scope, extendee) {
            Some(resolved) => self.shortest_reference(scope, &resolved.full_name),
            None => extendee.to_string(),
        };
        self.write_indent()?;
        writeln!(self.out, "extend {} {{", target)?;
        self.indent();
        for extension in extensions {
            let label = match extension.label {
                Label::Repeated => "repeated ",
                Label::Required => "required ",
                Label::Optional => match self.fd.syntax {
                    Syntax::Proto2 => "optional ",
                    Syntax::Proto3 => "",
                },
            };
            let (type_str, resolved) = self.type_string(extension, scope);
            self.write_indent()?;
            write!(
                self.out,
                "{}{} {} = {}",
                label, type_str, extension.name, extension.number
            )?;
            self.field_option_bracket(extension)?;
            write!(self.out, ";")?;
            if !resolved {
                write!(self.out, " // unresolved")?;
            }
            writeln!(self.out)?;
        }
        self.dedent();
        self.writeln("}")?;
        Ok(())
    }
}

/// Groups extension fields by their extendee, preserving first-seen order.
fn group_by_extendee(extensions: &[FieldDescriptor]) -> Vec<(&str, Vec<&FieldDescriptor>)> {
    let mut groups: Vec<(&str, Vec<&FieldDescriptor>)> = Vec::new();
    for extension in extensions {
        let extendee = extension.extendee.as_deref().unwrap_or("");
        match groups.iter_mut().find(|(e, _)| *e == extendee) {
            Some((_, members)) => members.push(extension),
            None => groups.push((extendee, vec![extension])),
        }
    }
    groups
}

fn join_scope(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

/// Escape a string for proto syntax
fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_ascii_control() => {
                result.push_str(&format!("\\x{:02x}", c as u8));
            }
            _ => result.push(c),
        }
    }
    result
}

/// Convert a snake_case name to lowerCamelCase
fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        EnumValueDescriptor, FileOptions, MessageOptions, MethodDescriptor, NumberRange,
    };
    use crate::registry::Origin;
    use pretty_assertions::assert_eq;

    fn registered(fd: FileDescriptor) -> Registry {
        let mut registry = Registry::new();
        registry.register(fd, Origin::default());
        registry
    }

    fn scalar_field(name: &str, number: i32, field_type: FieldType) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            number,
            field_type,
            ..Default::default()
        }
    }

    #[test]
    fn test_render_simple_proto3_file() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            package: "pkg".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![MessageDescriptor {
                name: "Foo".to_string(),
                field: vec![scalar_field("bar", 1, FieldType::Int32)],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let rendered = render_file(&fd, &registry);

        assert_eq!(rendered.path, "foo.proto");
        assert_eq!(
            rendered.source,
            "syntax = \"proto3\";\n\npackage pkg;\n\nmessage Foo {\n  int32 bar = 1;\n}\n"
        );
        assert!(rendered.unresolved.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            package: "pkg".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![MessageDescriptor {
                name: "Foo".to_string(),
                field: vec![
                    scalar_field("a", 1, FieldType::String),
                    scalar_field("b", 2, FieldType::Bool),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        assert_eq!(
            render_file(&fd, &registry).source,
            render_file(&fd, &registry).source
        );
    }

    #[test]
    fn test_render_map_field_inversion() {
        let entry = MessageDescriptor {
            name: "TagsEntry".to_string(),
            field: vec![
                scalar_field("key", 1, FieldType::String),
                scalar_field("value", 2, FieldType::Int32),
            ],
            options: MessageOptions {
                map_entry: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            package: "pkg".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![MessageDescriptor {
                name: "Foo".to_string(),
                field: vec![FieldDescriptor {
                    name: "tags".to_string(),
                    number: 3,
                    label: Label::Repeated,
                    field_type: FieldType::Message,
                    type_name: Some(".pkg.Foo.TagsEntry".to_string()),
                    ..Default::default()
                }],
                nested_type: vec![entry],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("map<string, int32> tags = 3;"));
        // The synthetic entry message never renders, and the repeated label
        // is suppressed
        assert!(!source.contains("TagsEntry"));
        assert!(!source.contains("repeated"));
    }

    #[test]
    fn test_render_oneof_grouping() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![MessageDescriptor {
                name: "Event".to_string(),
                field: vec![
                    scalar_field("id", 1, FieldType::Int64),
                    FieldDescriptor {
                        name: "text".to_string(),
                        number: 2,
                        field_type: FieldType::String,
                        oneof_index: Some(0),
                        ..Default::default()
                    },
                    FieldDescriptor {
                        name: "code".to_string(),
                        number: 3,
                        field_type: FieldType::Int32,
                        oneof_index: Some(0),
                        ..Default::default()
                    },
                ],
                oneof_decl: vec!["payload".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        let expected = "\
syntax = \"proto3\";

message Event {
  int64 id = 1;
  oneof payload {
    string text = 2;
    int32 code = 3;
  }
}
";
        assert_eq!(source, expected);
    }

    #[test]
    fn test_render_proto3_optional_not_a_oneof() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![MessageDescriptor {
                name: "Foo".to_string(),
                field: vec![FieldDescriptor {
                    name: "maybe".to_string(),
                    number: 1,
                    field_type: FieldType::String,
                    oneof_index: Some(0),
                    proto3_optional: true,
                    ..Default::default()
                }],
                oneof_decl: vec!["_maybe".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("optional string maybe = 1;"));
        assert!(!source.contains("oneof"));
    }

    #[test]
    fn test_render_underscore_oneof_with_members_stays_grouped() {
        // A user may name a oneof with a leading underscore; only a
        // single-member oneof is treated as synthetic.
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![MessageDescriptor {
                name: "Choice".to_string(),
                field: vec![
                    FieldDescriptor {
                        name: "a".to_string(),
                        number: 1,
                        field_type: FieldType::String,
                        oneof_index: Some(0),
                        ..Default::default()
                    },
                    FieldDescriptor {
                        name: "b".to_string(),
                        number: 2,
                        field_type: FieldType::Int32,
                        oneof_index: Some(0),
                        ..Default::default()
                    },
                ],
                oneof_decl: vec!["_choice".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("oneof _choice {"));
        assert!(source.contains("string a = 1;"));
        assert!(source.contains("int32 b = 2;"));
        assert!(!source.contains("optional"));
    }

    #[test]
    fn test_render_proto2_defaults_and_required() {
        let fd = FileDescriptor {
            name: "legacy.proto".to_string(),
            syntax: Syntax::Proto2,
            message_type: vec![MessageDescriptor {
                name: "Legacy".to_string(),
                field: vec![
                    FieldDescriptor {
                        name: "id".to_string(),
                        number: 1,
                        label: Label::Required,
                        field_type: FieldType::Int32,
                        ..Default::default()
                    },
                    FieldDescriptor {
                        name: "note".to_string(),
                        number: 2,
                        label: Label::Optional,
                        field_type: FieldType::String,
                        default_value: Some("n/a".to_string()),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("required int32 id = 1;"));
        assert!(source.contains("optional string note = 2 [default = \"n/a\"];"));
    }

    #[test]
    fn test_render_enum_with_reserved() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            syntax: Syntax::Proto3,
            enum_type: vec![EnumDescriptor {
                name: "Color".to_string(),
                allow_alias: true,
                value: vec![
                    EnumValueDescriptor {
                        name: "COLOR_UNSPECIFIED".to_string(),
                        number: 0,
                        ..Default::default()
                    },
                    EnumValueDescriptor {
                        name: "COLOR_RED".to_string(),
                        number: 1,
                        ..Default::default()
                    },
                    EnumValueDescriptor {
                        name: "COLOR_CRIMSON".to_string(),
                        number: 1,
                        deprecated: true,
                    },
                ],
                // Enum reserved ranges are end-inclusive
                reserved_range: vec![NumberRange { start: 5, end: 7 }],
                reserved_name: vec!["COLOR_OLD".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("option allow_alias = true;"));
        assert!(source.contains("COLOR_UNSPECIFIED = 0;"));
        assert!(source.contains("COLOR_CRIMSON = 1 [deprecated = true];"));
        assert!(source.contains("reserved 5 to 7;"));
        assert!(source.contains("reserved \"COLOR_OLD\";"));
    }

    #[test]
    fn test_render_reserved_and_extension_ranges() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            syntax: Syntax::Proto2,
            message_type: vec![MessageDescriptor {
                name: "Holder".to_string(),
                // Message ranges are end-exclusive on the wire
                reserved_range: vec![
                    NumberRange { start: 4, end: 5 },
                    NumberRange { start: 10, end: 21 },
                ],
                reserved_name: vec!["legacy".to_string()],
                extension_range: vec![NumberRange {
                    start: 100,
                    end: MAX_FIELD_NUMBER as i32 + 1,
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("extensions 100 to max;"));
        assert!(source.contains("reserved 4, 10 to 20;"));
        assert!(source.contains("reserved \"legacy\";"));
    }

    #[test]
    fn test_render_service_streaming() {
        let mut fd = FileDescriptor {
            name: "svc.proto".to_string(),
            package: "pkg".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![
                MessageDescriptor {
                    name: "Req".to_string(),
                    ..Default::default()
                },
                MessageDescriptor {
                    name: "Resp".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        fd.service.push(ServiceDescriptor {
            name: "Pump".to_string(),
            method: vec![
                MethodDescriptor {
                    name: "Pull".to_string(),
                    input_type: ".pkg.Req".to_string(),
                    output_type: ".pkg.Resp".to_string(),
                    client_streaming: false,
                    server_streaming: true,
                },
                MethodDescriptor {
                    name: "Exchange".to_string(),
                    input_type: ".pkg.Req".to_string(),
                    output_type: ".pkg.Resp".to_string(),
                    client_streaming: true,
                    server_streaming: true,
                },
            ],
        });
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("rpc Pull(Req) returns (stream Resp);"));
        assert!(source.contains("rpc Exchange(stream Req) returns (stream Resp);"));
    }

    #[test]
    fn test_render_unresolved_reference_best_effort() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            package: "pkg".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![MessageDescriptor {
                name: "Foo".to_string(),
                field: vec![FieldDescriptor {
                    name: "ghost".to_string(),
                    number: 1,
                    field_type: FieldType::Message,
                    type_name: Some(".elsewhere.Ghost".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let rendered = render_file(&fd, &registry);

        assert!(rendered.source.contains(".elsewhere.Ghost ghost = 1; // unresolved"));
        assert_eq!(rendered.unresolved.len(), 1);
        assert_eq!(rendered.unresolved[0].type_name, ".elsewhere.Ghost");
    }

    #[test]
    fn test_render_shortens_same_package_reference() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            package: "pkg".to_string(),
            syntax: Syntax::Proto3,
            message_type: vec![
                MessageDescriptor {
                    name: "A".to_string(),
                    ..Default::default()
                },
                MessageDescriptor {
                    name: "B".to_string(),
                    field: vec![FieldDescriptor {
                        name: "a".to_string(),
                        number: 1,
                        field_type: FieldType::Message,
                        type_name: Some(".pkg.A".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;
        assert!(source.contains("A a = 1;"));
        assert!(!source.contains(".pkg.A a"));
    }

    #[test]
    fn test_render_imports_with_modifiers() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            syntax: Syntax::Proto3,
            dependency: vec![
                "a.proto".to_string(),
                "b.proto".to_string(),
                "c.proto".to_string(),
            ],
            public_dependency: vec![1],
            weak_dependency: vec![2],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("import \"a.proto\";"));
        assert!(source.contains("import public \"b.proto\";"));
        assert!(source.contains("import weak \"c.proto\";"));
    }

    #[test]
    fn test_render_file_options() {
        let fd = FileDescriptor {
            name: "foo.proto".to_string(),
            syntax: Syntax::Proto3,
            options: FileOptions {
                java_package: Some("com.example.foo".to_string()),
                go_package: Some("example.com/foo".to_string()),
                cc_enable_arenas: Some(true),
                unknown: vec![crate::descriptor::UnknownOption {
                    number: 50000,
                    value: UnknownValue::Varint(7),
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("option java_package = \"com.example.foo\";"));
        assert!(source.contains("option go_package = \"example.com/foo\";"));
        assert!(source.contains("option cc_enable_arenas = true;"));
        assert!(source.contains("option (field_50000) = 7;"));
    }

    #[test]
    fn test_render_extend_block() {
        let fd = FileDescriptor {
            name: "ext.proto".to_string(),
            package: "pkg".to_string(),
            syntax: Syntax::Proto2,
            message_type: vec![MessageDescriptor {
                name: "Base".to_string(),
                extension_range: vec![NumberRange { start: 10, end: 20 }],
                ..Default::default()
            }],
            extension: vec![FieldDescriptor {
                name: "extra".to_string(),
                number: 10,
                label: Label::Optional,
                field_type: FieldType::String,
                extendee: Some(".pkg.Base".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registered(fd.clone());
        let source = render_file(&fd, &registry).source;

        assert!(source.contains("extend Base {"));
        assert!(source.contains("optional string extra = 10;"));
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hello"), "hello");
        assert_eq!(escape_string("hello\\world"), "hello\\\\world");
        assert_eq!(escape_string("hello\"world"), "hello\\\"world");
        assert_eq!(escape_string("hello\nworld"), "hello\\nworld");
    }

    #[test]
    fn test_to_lower_camel_case() {
        assert_eq!(to_lower_camel_case("hello_world"), "helloWorld");
        assert_eq!(to_lower_camel_case("my_field_name"), "myFieldName");
        assert_eq!(to_lower_camel_case("simple"), "simple");
    }
}
