//! Typed descriptor model recovered from serialized `FileDescriptorProto` data.
//!
//! These types mirror the schema of `google/protobuf/descriptor.proto`, but
//! are owned, pointer-free structures: every cross-file or cross-message type
//! reference is kept as a plain qualified-name string and resolved on demand
//! through the [`Registry`](crate::registry::Registry). A descriptor tree is
//! immutable once it leaves the decoder.

pub(crate) mod decode;
pub(crate) mod wire;

pub use decode::{decode, decode_prefix, MAX_RECURSION_DEPTH};

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;

/// Proto syntax version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Syntax {
    /// Proto2 syntax (the implicit default when the syntax field is absent)
    #[default]
    Proto2,
    /// Proto3 syntax
    Proto3,
}

impl Syntax {
    /// Returns the syntax declaration string
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

impl TryFrom<&str> for Syntax {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "" | "proto2" => Ok(Syntax::Proto2),
            "proto3" => Ok(Syntax::Proto3),
            _ => Err(Error::UnsupportedSyntax {
                syntax: value.to_string(),
            }),
        }
    }
}

/// One recovered schema file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Logical proto path, e.g. `google/protobuf/timestamp.proto`.
    /// This is the identity key: two descriptors with the same name are the
    /// same logical file.
    pub name: String,
    /// Dotted package namespace, empty if unset
    pub package: String,
    /// Imported file names, in declaration order
    pub dependency: Vec<String>,
    /// Indices into `dependency` that are `import public`
    pub public_dependency: Vec<i32>,
    /// Indices into `dependency` that are `import weak`
    pub weak_dependency: Vec<i32>,
    /// Top-level messages
    pub message_type: Vec<MessageDescriptor>,
    /// Top-level enums
    pub enum_type: Vec<EnumDescriptor>,
    /// Services
    pub service: Vec<ServiceDescriptor>,
    /// Top-level extension fields
    pub extension: Vec<FieldDescriptor>,
    /// File-level options
    pub options: FileOptions,
    /// Schema dialect
    pub syntax: Syntax,
}

/// Known file-level options, plus raw capture of unrecognized ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOptions {
    /// `option java_package = "...";`
    pub java_package: Option<String>,
    /// `option java_outer_classname = "...";`
    pub java_outer_classname: Option<String>,
    /// `option java_multiple_files = ...;`
    pub java_multiple_files: Option<bool>,
    /// `option java_string_check_utf8 = ...;`
    pub java_string_check_utf8: Option<bool>,
    /// `option optimize_for = ...;`
    pub optimize_for: Option<OptimizeMode>,
    /// `option go_package = "...";`
    pub go_package: Option<String>,
    /// `option deprecated = ...;`
    pub deprecated: Option<bool>,
    /// `option cc_enable_arenas = ...;`
    pub cc_enable_arenas: Option<bool>,
    /// `option objc_class_prefix = "...";`
    pub objc_class_prefix: Option<String>,
    /// `option csharp_namespace = "...";`
    pub csharp_namespace: Option<String>,
    /// `option swift_prefix = "...";`
    pub swift_prefix: Option<String>,
    /// `option php_class_prefix = "...";`
    pub php_class_prefix: Option<String>,
    /// `option php_namespace = "...";`
    pub php_namespace: Option<String>,
    /// `option php_metadata_namespace = "...";`
    pub php_metadata_namespace: Option<String>,
    /// `option ruby_package = "...";`
    pub ruby_package: Option<String>,
    /// Option fields with numbers this decoder does not recognize,
    /// preserved with their raw wire values
    pub unknown: Vec<UnknownOption>,
}

/// `optimize_for` modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeMode {
    /// Generate complete, fast code
    Speed,
    /// Generate smaller code
    CodeSize,
    /// Generate code against the lite runtime
    LiteRuntime,
}

impl OptimizeMode {
    /// The identifier used in `option optimize_for = ...;`
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizeMode::Speed => "SPEED",
            OptimizeMode::CodeSize => "CODE_SIZE",
            OptimizeMode::LiteRuntime => "LITE_RUNTIME",
        }
    }

    pub(crate) fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(OptimizeMode::Speed),
            2 => Some(OptimizeMode::CodeSize),
            3 => Some(OptimizeMode::LiteRuntime),
            _ => None,
        }
    }
}

/// An option field the decoder has no canonical name for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOption {
    /// Field number inside the options message
    pub number: u32,
    /// Raw wire value
    pub value: UnknownValue,
}

/// Raw wire value of an unrecognized option field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownValue {
    /// Varint-encoded value
    Varint(u64),
    /// 32-bit fixed-width value
    Fixed32(u32),
    /// 64-bit fixed-width value
    Fixed64(u64),
    /// Length-delimited payload
    Bytes(Vec<u8>),
}

/// One message declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDescriptor {
    /// Simple (unqualified) message name
    pub name: String,
    /// Fields in declaration order
    pub field: Vec<FieldDescriptor>,
    /// Extension fields declared inside this message
    pub extension: Vec<FieldDescriptor>,
    /// Nested message declarations
    pub nested_type: Vec<MessageDescriptor>,
    /// Nested enum declarations
    pub enum_type: Vec<EnumDescriptor>,
    /// `extensions X to Y;` ranges, end-exclusive
    pub extension_range: Vec<NumberRange>,
    /// Declared oneof group names, indexed by `FieldDescriptor::oneof_index`
    pub oneof_decl: Vec<String>,
    /// `reserved X to Y;` ranges, end-exclusive
    pub reserved_range: Vec<NumberRange>,
    /// `reserved "name";` entries
    pub reserved_name: Vec<String>,
    /// Message-level options
    pub options: MessageOptions,
}

impl MessageDescriptor {
    /// True if this message is a compiler-synthesized map entry
    /// (two fields named key/value, numbers 1 and 2).
    pub fn is_map_entry(&self) -> bool {
        self.options.map_entry
    }

    /// Looks up a map entry's key and value fields
    pub fn map_entry_fields(&self) -> Option<(&FieldDescriptor, &FieldDescriptor)> {
        if !self.options.map_entry {
            return None;
        }
        let key = self.field.iter().find(|f| f.number == 1)?;
        let value = self.field.iter().find(|f| f.number == 2)?;
        Some((key, value))
    }
}

/// Message-level options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Marks a synthetic map-entry message
    pub map_entry: bool,
    /// `option deprecated = true;`
    pub deprecated: bool,
}

/// A numeric range attached to a message or enum.
///
/// Message reserved/extension ranges are end-exclusive on the wire; enum
/// reserved ranges are end-inclusive. The renderer accounts for the
/// difference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumberRange {
    /// First number in the range
    pub start: i32,
    /// Last number (exclusive for messages, inclusive for enums)
    pub end: i32,
}

/// Field cardinality label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Label {
    /// `optional` (and the proto3 implicit default)
    #[default]
    Optional,
    /// `required` (proto2 only)
    Required,
    /// `repeated`
    Repeated,
}

impl Label {
    pub(crate) fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Label::Optional),
            2 => Some(Label::Required),
            3 => Some(Label::Repeated),
            _ => None,
        }
    }
}

/// Field scalar kind or message/enum reference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldType {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int64`
    Int64,
    /// `uint64`
    Uint64,
    /// `int32`
    #[default]
    Int32,
    /// `fixed64`
    Fixed64,
    /// `fixed32`
    Fixed32,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// Proto2 group (rendered as a message reference)
    Group,
    /// Message reference, see `type_name`
    Message,
    /// `bytes`
    Bytes,
    /// `uint32`
    Uint32,
    /// Enum reference, see `type_name`
    Enum,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
}

impl FieldType {
    pub(crate) fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            1 => FieldType::Double,
            2 => FieldType::Float,
            3 => FieldType::Int64,
            4 => FieldType::Uint64,
            5 => FieldType::Int32,
            6 => FieldType::Fixed64,
            7 => FieldType::Fixed32,
            8 => FieldType::Bool,
            9 => FieldType::String,
            10 => FieldType::Group,
            11 => FieldType::Message,
            12 => FieldType::Bytes,
            13 => FieldType::Uint32,
            14 => FieldType::Enum,
            15 => FieldType::Sfixed32,
            16 => FieldType::Sfixed64,
            17 => FieldType::Sint32,
            18 => FieldType::Sint64,
            _ => return None,
        })
    }

    /// The proto keyword for a scalar type; `None` for message/enum/group
    /// references, which render through their `type_name`.
    pub fn scalar_name(&self) -> Option<&'static str> {
        Some(match self {
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Int32 => "int32",
            FieldType::Fixed64 => "fixed64",
            FieldType::Fixed32 => "fixed32",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Uint32 => "uint32",
            FieldType::Sfixed32 => "sfixed32",
            FieldType::Sfixed64 => "sfixed64",
            FieldType::Sint32 => "sint32",
            FieldType::Sint64 => "sint64",
            FieldType::Group | FieldType::Message | FieldType::Enum => return None,
        })
    }
}

/// One field (or extension) declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Field number, unique within the enclosing message
    pub number: i32,
    /// Cardinality label
    pub label: Label,
    /// Scalar kind or message/enum reference
    pub field_type: FieldType,
    /// Fully qualified reference for message/enum-typed fields,
    /// usually with a leading dot
    pub type_name: Option<String>,
    /// For extensions: the message being extended
    pub extendee: Option<String>,
    /// Textual default value (proto2)
    pub default_value: Option<String>,
    /// Index into the enclosing message's `oneof_decl`
    pub oneof_index: Option<i32>,
    /// JSON name, if it differs from the field name's camelCase form
    pub json_name: Option<String>,
    /// Proto3 explicit `optional` (backed by a synthetic oneof)
    pub proto3_optional: bool,
    /// Field-level options
    pub options: FieldOptions,
}

/// Field-level options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// `[packed = ...]`
    pub packed: Option<bool>,
    /// `[deprecated = true]`
    pub deprecated: bool,
}

/// One enum declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumDescriptor {
    /// Simple enum name
    pub name: String,
    /// Values in declaration order
    pub value: Vec<EnumValueDescriptor>,
    /// `option allow_alias = true;` (duplicate numeric values permitted)
    pub allow_alias: bool,
    /// `option deprecated = true;`
    pub deprecated: bool,
    /// Reserved ranges, end-inclusive
    pub reserved_range: Vec<NumberRange>,
    /// Reserved value names
    pub reserved_name: Vec<String>,
}

/// One enum value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumValueDescriptor {
    /// Value name
    pub name: String,
    /// Numeric value
    pub number: i32,
    /// `[deprecated = true]`
    pub deprecated: bool,
}

/// One service declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service name
    pub name: String,
    /// Methods in declaration order
    pub method: Vec<MethodDescriptor>,
}

/// One rpc method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Method name
    pub name: String,
    /// Request type reference
    pub input_type: String,
    /// Response type reference
    pub output_type: String,
    /// `rpc M(stream Req)`
    pub client_streaming: bool,
    /// `returns (stream Resp)`
    pub server_streaming: bool,
}

impl FileDescriptor {
    /// Checks the structural invariants a decoded descriptor must satisfy
    /// before it may be registered: a non-empty file name, unique field
    /// numbers per message, unique type names per scope, and in-range oneof
    /// back-references. A violation demotes the decode to a failure.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::structural("file descriptor has no name"));
        }
        check_scope_names(&self.name, &self.message_type, &self.enum_type)?;
        for message in &self.message_type {
            validate_message(message, &self.name)?;
        }
        for en in &self.enum_type {
            validate_enum(en, &self.name)?;
        }
        Ok(())
    }
}

fn validate_message(message: &MessageDescriptor, context: &str) -> Result<()> {
    if message.name.is_empty() {
        return Err(Error::structural(format!(
            "unnamed message in {context}"
        )));
    }
    let context = format!("{context}.{}", message.name);

    let mut numbers = std::collections::HashSet::new();
    for field in &message.field {
        if field.number < 1 || field.number > MAX_FIELD_NUMBER as i32 {
            return Err(Error::structural(format!(
                "field {} in {context} has out-of-range number {}",
                field.name, field.number
            )));
        }
        if !numbers.insert(field.number) {
            return Err(Error::structural(format!(
                "duplicate field number {} in {context}",
                field.number
            )));
        }
        if let Some(idx) = field.oneof_index {
            if idx < 0 || idx as usize >= message.oneof_decl.len() {
                return Err(Error::structural(format!(
                    "field {} in {context} references oneof index {idx} out of range",
                    field.name
                )));
            }
        }
    }

    check_scope_names(&context, &message.nested_type, &message.enum_type)?;
    for nested in &message.nested_type {
        validate_message(nested, &context)?;
    }
    for en in &message.enum_type {
        validate_enum(en, &context)?;
    }
    Ok(())
}

fn validate_enum(en: &EnumDescriptor, context: &str) -> Result<()> {
    if en.name.is_empty() {
        return Err(Error::structural(format!("unnamed enum in {context}")));
    }
    let mut names = std::collections::HashSet::new();
    for value in &en.value {
        if value.name.is_empty() {
            return Err(Error::structural(format!(
                "unnamed value in enum {context}.{}",
                en.name
            )));
        }
        if !names.insert(value.name.as_str()) {
            return Err(Error::structural(format!(
                "duplicate value name {} in enum {context}.{}",
                value.name, en.name
            )));
        }
    }
    Ok(())
}

/// Message and enum names share one namespace within a scope.
fn check_scope_names(
    context: &str,
    messages: &[MessageDescriptor],
    enums: &[EnumDescriptor],
) -> Result<()> {
    let mut names = std::collections::HashSet::new();
    for name in messages
        .iter()
        .map(|m| m.name.as_str())
        .chain(enums.iter().map(|e| e.name.as_str()))
    {
        if !name.is_empty() && !names.insert(name) {
            return Err(Error::structural(format!(
                "duplicate type name {name} in {context}"
            )));
        }
    }
    Ok(())
}
