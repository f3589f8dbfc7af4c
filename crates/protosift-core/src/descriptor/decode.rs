//! Hand-rolled decoder for serialized `FileDescriptorProto` bytes.
//!
//! The descriptor schema is fixed and self-describing, so no external schema
//! file is consulted: every field is matched by number against the static
//! shape of `google/protobuf/descriptor.proto`. Unknown field numbers are
//! skipped by wire type for forward compatibility; wire-type mismatches on
//! known fields, lengths running past the buffer, and over-deep nesting are
//! all decode failures, never panics.
//!
//! Embedded descriptors carry no outer length prefix (they are NUL-terminated
//! C strings in the compiled binary), so the top level parses greedily and
//! treats the first malformed tag, or a second `name` field from an adjacent
//! descriptor, as the end of the record. Nested messages are strict: their
//! length-delimited payload must parse exactly.

use super::wire::{decode_varint, WireReader, WireType};
use super::{
    EnumDescriptor, EnumValueDescriptor, FieldDescriptor, FieldOptions, FieldType,
    FileDescriptor, FileOptions, Label, MessageDescriptor, MessageOptions, MethodDescriptor,
    NumberRange, OptimizeMode, ServiceDescriptor, Syntax, UnknownOption, UnknownValue,
};
use crate::error::{Error, Result};

/// Bound on message nesting, guarding against garbage input that happens to
/// parse as ever-deeper submessages.
pub const MAX_RECURSION_DEPTH: usize = 64;

/// Decodes a complete buffer as exactly one file descriptor.
///
/// The whole buffer must be consumed; leftover bytes (including a partial
/// trailing field from truncation) are an error. The decoded tree has already
/// passed the structural-validity checks of
/// [`FileDescriptor::validate`](super::FileDescriptor::validate).
pub fn decode(data: &[u8]) -> Result<FileDescriptor> {
    let (fd, consumed) = decode_file(data)?;
    if consumed != data.len() {
        return Err(Error::invalid_wire_format(
            consumed,
            "trailing bytes after descriptor",
        ));
    }
    Ok(fd)
}

/// Decodes one file descriptor from the front of a buffer, returning the
/// descriptor and the number of bytes it spans.
///
/// This is the scanning entry point: the buffer usually continues with
/// unrelated binary content, so parsing stops at the first byte that cannot
/// be a continuation of the record.
pub fn decode_prefix(data: &[u8]) -> Result<(FileDescriptor, usize)> {
    decode_file(data)
}

struct FileParts {
    fd: FileDescriptor,
    syntax_raw: String,
    saw_name: bool,
}

enum Step {
    Field,
    End,
}

fn decode_file(data: &[u8]) -> Result<(FileDescriptor, usize)> {
    let mut r = WireReader::new(data);
    let mut parts = FileParts {
        fd: FileDescriptor::default(),
        syntax_raw: String::new(),
        saw_name: false,
    };

    let end;
    loop {
        let mark = r.pos();
        if r.is_empty() {
            end = mark;
            break;
        }
        match file_field(&mut r, &mut parts) {
            Ok(Step::Field) => {}
            Ok(Step::End) => {
                end = mark;
                break;
            }
            Err(e) => {
                if !parts.saw_name {
                    // Nothing recovered yet; this candidate is not a descriptor.
                    return Err(e);
                }
                // The record ends where the last well-formed field ended.
                end = mark;
                break;
            }
        }
    }

    let mut fd = parts.fd;
    fd.syntax = Syntax::try_from(parts.syntax_raw.as_str())?;
    fd.validate()?;
    Ok((fd, end))
}

/// Parses one top-level `FileDescriptorProto` field.
fn file_field(r: &mut WireReader<'_>, parts: &mut FileParts) -> Result<Step> {
    let offset = r.pos();
    let (num, wt) = r.read_tag()?;
    match num {
        1 => {
            if parts.saw_name {
                // A second name field means an adjacent descriptor follows.
                return Ok(Step::End);
            }
            parts.fd.name = expect_string(r, wt, offset, "name")?;
            parts.saw_name = true;
        }
        2 => parts.fd.package = expect_string(r, wt, offset, "package")?,
        3 => parts
            .fd
            .dependency
            .push(expect_string(r, wt, offset, "dependency")?),
        4 => parts
            .fd
            .message_type
            .push(decode_message(expect_len(r, wt, offset, "message_type")?, 1)?),
        5 => parts
            .fd
            .enum_type
            .push(decode_enum(expect_len(r, wt, offset, "enum_type")?)?),
        6 => parts
            .fd
            .service
            .push(decode_service(expect_len(r, wt, offset, "service")?)?),
        7 => parts
            .fd
            .extension
            .push(decode_field(expect_len(r, wt, offset, "extension")?)?),
        8 => parts.fd.options = decode_file_options(expect_len(r, wt, offset, "options")?)?,
        9 => {
            // source_code_info: present in some embeddings, never recovered
            expect_len(r, wt, offset, "source_code_info")?;
        }
        10 => repeated_int32(r, wt, offset, &mut parts.fd.public_dependency)?,
        11 => repeated_int32(r, wt, offset, &mut parts.fd.weak_dependency)?,
        12 => parts.syntax_raw = expect_string(r, wt, offset, "syntax")?,
        _ => r.skip(wt)?,
    }
    Ok(Step::Field)
}

fn decode_message(data: &[u8], depth: usize) -> Result<MessageDescriptor> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimit {
            max_depth: MAX_RECURSION_DEPTH,
        });
    }
    let mut r = WireReader::new(data);
    let mut m = MessageDescriptor::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => m.name = expect_string(&mut r, wt, offset, "DescriptorProto.name")?,
            2 => m
                .field
                .push(decode_field(expect_len(&mut r, wt, offset, "field")?)?),
            3 => m.nested_type.push(decode_message(
                expect_len(&mut r, wt, offset, "nested_type")?,
                depth + 1,
            )?),
            4 => m
                .enum_type
                .push(decode_enum(expect_len(&mut r, wt, offset, "enum_type")?)?),
            5 => m.extension_range.push(decode_range(expect_len(
                &mut r,
                wt,
                offset,
                "extension_range",
            )?)?),
            6 => m
                .extension
                .push(decode_field(expect_len(&mut r, wt, offset, "extension")?)?),
            7 => m.options = decode_message_options(expect_len(&mut r, wt, offset, "options")?)?,
            8 => m
                .oneof_decl
                .push(decode_oneof(expect_len(&mut r, wt, offset, "oneof_decl")?)?),
            9 => m.reserved_range.push(decode_range(expect_len(
                &mut r,
                wt,
                offset,
                "reserved_range",
            )?)?),
            10 => m
                .reserved_name
                .push(expect_string(&mut r, wt, offset, "reserved_name")?),
            _ => r.skip(wt)?,
        }
    }
    Ok(m)
}

fn decode_field(data: &[u8]) -> Result<FieldDescriptor> {
    let mut r = WireReader::new(data);
    let mut f = FieldDescriptor::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => f.name = expect_string(&mut r, wt, offset, "FieldDescriptorProto.name")?,
            2 => f.extendee = Some(expect_string(&mut r, wt, offset, "extendee")?),
            3 => f.number = expect_int32(&mut r, wt, offset, "number")?,
            4 => {
                let raw = expect_int32(&mut r, wt, offset, "label")?;
                f.label = Label::from_i32(raw).ok_or_else(|| {
                    Error::invalid_wire_format(offset, format!("unknown field label {raw}"))
                })?;
            }
            5 => {
                let raw = expect_int32(&mut r, wt, offset, "type")?;
                f.field_type = FieldType::from_i32(raw).ok_or_else(|| {
                    Error::invalid_wire_format(offset, format!("unknown field type {raw}"))
                })?;
            }
            6 => f.type_name = Some(expect_string(&mut r, wt, offset, "type_name")?),
            7 => f.default_value = Some(expect_string(&mut r, wt, offset, "default_value")?),
            8 => f.options = decode_field_options(expect_len(&mut r, wt, offset, "options")?)?,
            9 => f.oneof_index = Some(expect_int32(&mut r, wt, offset, "oneof_index")?),
            10 => f.json_name = Some(expect_string(&mut r, wt, offset, "json_name")?),
            17 => f.proto3_optional = expect_bool(&mut r, wt, offset, "proto3_optional")?,
            _ => r.skip(wt)?,
        }
    }
    Ok(f)
}

fn decode_oneof(data: &[u8]) -> Result<String> {
    let mut r = WireReader::new(data);
    let mut name = String::new();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => name = expect_string(&mut r, wt, offset, "OneofDescriptorProto.name")?,
            _ => r.skip(wt)?,
        }
    }
    Ok(name)
}

fn decode_enum(data: &[u8]) -> Result<EnumDescriptor> {
    let mut r = WireReader::new(data);
    let mut e = EnumDescriptor::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => e.name = expect_string(&mut r, wt, offset, "EnumDescriptorProto.name")?,
            2 => e
                .value
                .push(decode_enum_value(expect_len(&mut r, wt, offset, "value")?)?),
            3 => {
                let (allow_alias, deprecated) =
                    decode_enum_options(expect_len(&mut r, wt, offset, "options")?)?;
                e.allow_alias = allow_alias;
                e.deprecated = deprecated;
            }
            4 => e.reserved_range.push(decode_range(expect_len(
                &mut r,
                wt,
                offset,
                "reserved_range",
            )?)?),
            5 => e
                .reserved_name
                .push(expect_string(&mut r, wt, offset, "reserved_name")?),
            _ => r.skip(wt)?,
        }
    }
    Ok(e)
}

fn decode_enum_value(data: &[u8]) -> Result<EnumValueDescriptor> {
    let mut r = WireReader::new(data);
    let mut v = EnumValueDescriptor::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => v.name = expect_string(&mut r, wt, offset, "EnumValueDescriptorProto.name")?,
            2 => v.number = expect_int32(&mut r, wt, offset, "number")?,
            3 => {
                let payload = expect_len(&mut r, wt, offset, "options")?;
                v.deprecated = decode_bool_option(payload, 1)?;
            }
            _ => r.skip(wt)?,
        }
    }
    Ok(v)
}

fn decode_service(data: &[u8]) -> Result<ServiceDescriptor> {
    let mut r = WireReader::new(data);
    let mut s = ServiceDescriptor::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => s.name = expect_string(&mut r, wt, offset, "ServiceDescriptorProto.name")?,
            2 => s
                .method
                .push(decode_method(expect_len(&mut r, wt, offset, "method")?)?),
            _ => r.skip(wt)?,
        }
    }
    Ok(s)
}

fn decode_method(data: &[u8]) -> Result<MethodDescriptor> {
    let mut r = WireReader::new(data);
    let mut m = MethodDescriptor::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => m.name = expect_string(&mut r, wt, offset, "MethodDescriptorProto.name")?,
            2 => m.input_type = expect_string(&mut r, wt, offset, "input_type")?,
            3 => m.output_type = expect_string(&mut r, wt, offset, "output_type")?,
            5 => m.client_streaming = expect_bool(&mut r, wt, offset, "client_streaming")?,
            6 => m.server_streaming = expect_bool(&mut r, wt, offset, "server_streaming")?,
            _ => r.skip(wt)?,
        }
    }
    Ok(m)
}

fn decode_file_options(data: &[u8]) -> Result<FileOptions> {
    let mut r = WireReader::new(data);
    let mut o = FileOptions::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => o.java_package = Some(expect_string(&mut r, wt, offset, "java_package")?),
            8 => {
                o.java_outer_classname =
                    Some(expect_string(&mut r, wt, offset, "java_outer_classname")?)
            }
            9 => {
                let raw = expect_int32(&mut r, wt, offset, "optimize_for")?;
                o.optimize_for = OptimizeMode::from_i32(raw);
            }
            10 => {
                o.java_multiple_files =
                    Some(expect_bool(&mut r, wt, offset, "java_multiple_files")?)
            }
            11 => o.go_package = Some(expect_string(&mut r, wt, offset, "go_package")?),
            23 => o.deprecated = Some(expect_bool(&mut r, wt, offset, "deprecated")?),
            27 => {
                o.java_string_check_utf8 =
                    Some(expect_bool(&mut r, wt, offset, "java_string_check_utf8")?)
            }
            31 => o.cc_enable_arenas = Some(expect_bool(&mut r, wt, offset, "cc_enable_arenas")?),
            36 => {
                o.objc_class_prefix =
                    Some(expect_string(&mut r, wt, offset, "objc_class_prefix")?)
            }
            37 => o.csharp_namespace = Some(expect_string(&mut r, wt, offset, "csharp_namespace")?),
            39 => o.swift_prefix = Some(expect_string(&mut r, wt, offset, "swift_prefix")?),
            40 => {
                o.php_class_prefix = Some(expect_string(&mut r, wt, offset, "php_class_prefix")?)
            }
            41 => o.php_namespace = Some(expect_string(&mut r, wt, offset, "php_namespace")?),
            44 => {
                o.php_metadata_namespace =
                    Some(expect_string(&mut r, wt, offset, "php_metadata_namespace")?)
            }
            45 => o.ruby_package = Some(expect_string(&mut r, wt, offset, "ruby_package")?),
            _ => {
                // Custom or newer options: keep the raw value for rendering
                let value = match wt {
                    WireType::Varint => UnknownValue::Varint(r.read_varint()?),
                    WireType::I32 => UnknownValue::Fixed32(r.read_fixed32()?),
                    WireType::I64 => UnknownValue::Fixed64(r.read_fixed64()?),
                    WireType::Len => UnknownValue::Bytes(r.read_len_delimited()?.to_vec()),
                    WireType::StartGroup | WireType::EndGroup => {
                        r.skip(wt)?;
                        continue;
                    }
                };
                o.unknown.push(UnknownOption { number: num, value });
            }
        }
    }
    Ok(o)
}

fn decode_message_options(data: &[u8]) -> Result<MessageOptions> {
    let mut r = WireReader::new(data);
    let mut o = MessageOptions::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            3 => o.deprecated = expect_bool(&mut r, wt, offset, "deprecated")?,
            7 => o.map_entry = expect_bool(&mut r, wt, offset, "map_entry")?,
            _ => r.skip(wt)?,
        }
    }
    Ok(o)
}

fn decode_field_options(data: &[u8]) -> Result<FieldOptions> {
    let mut r = WireReader::new(data);
    let mut o = FieldOptions::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            2 => o.packed = Some(expect_bool(&mut r, wt, offset, "packed")?),
            3 => o.deprecated = expect_bool(&mut r, wt, offset, "deprecated")?,
            _ => r.skip(wt)?,
        }
    }
    Ok(o)
}

fn decode_enum_options(data: &[u8]) -> Result<(bool, bool)> {
    let mut r = WireReader::new(data);
    let mut allow_alias = false;
    let mut deprecated = false;
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            2 => allow_alias = expect_bool(&mut r, wt, offset, "allow_alias")?,
            3 => deprecated = expect_bool(&mut r, wt, offset, "deprecated")?,
            _ => r.skip(wt)?,
        }
    }
    Ok((allow_alias, deprecated))
}

/// Reads a single bool field by number out of a small options payload.
fn decode_bool_option(data: &[u8], field: u32) -> Result<bool> {
    let mut r = WireReader::new(data);
    let mut result = false;
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        if num == field {
            result = expect_bool(&mut r, wt, offset, "bool option")?;
        } else {
            r.skip(wt)?;
        }
    }
    Ok(result)
}

fn decode_range(data: &[u8]) -> Result<NumberRange> {
    let mut r = WireReader::new(data);
    let mut range = NumberRange::default();
    while !r.is_empty() {
        let offset = r.pos();
        let (num, wt) = r.read_tag()?;
        match num {
            1 => range.start = expect_int32(&mut r, wt, offset, "range start")?,
            2 => range.end = expect_int32(&mut r, wt, offset, "range end")?,
            _ => r.skip(wt)?,
        }
    }
    Ok(range)
}

fn expect_len<'a>(
    r: &mut WireReader<'a>,
    wt: WireType,
    offset: usize,
    what: &str,
) -> Result<&'a [u8]> {
    if wt != WireType::Len {
        return Err(Error::invalid_wire_format(
            offset,
            format!("{what}: expected length-delimited value, found {wt:?}"),
        ));
    }
    r.read_len_delimited()
}

fn expect_string(r: &mut WireReader<'_>, wt: WireType, offset: usize, what: &str) -> Result<String> {
    if wt != WireType::Len {
        return Err(Error::invalid_wire_format(
            offset,
            format!("{what}: expected string value, found {wt:?}"),
        ));
    }
    r.read_string()
}

fn expect_int32(r: &mut WireReader<'_>, wt: WireType, offset: usize, what: &str) -> Result<i32> {
    if wt != WireType::Varint {
        return Err(Error::invalid_wire_format(
            offset,
            format!("{what}: expected varint value, found {wt:?}"),
        ));
    }
    r.read_int32()
}

fn expect_bool(r: &mut WireReader<'_>, wt: WireType, offset: usize, what: &str) -> Result<bool> {
    if wt != WireType::Varint {
        return Err(Error::invalid_wire_format(
            offset,
            format!("{what}: expected varint value, found {wt:?}"),
        ));
    }
    r.read_bool()
}

/// Repeated int32 fields may arrive packed or one element at a time.
fn repeated_int32(
    r: &mut WireReader<'_>,
    wt: WireType,
    offset: usize,
    out: &mut Vec<i32>,
) -> Result<()> {
    match wt {
        WireType::Varint => out.push(r.read_int32()?),
        WireType::Len => {
            let payload = r.read_len_delimited()?;
            let mut pos = 0;
            while pos < payload.len() {
                let (value, len) = decode_varint(&payload[pos..])
                    .map_err(|_| Error::varint_decode(offset + pos))?;
                out.push(value as i32);
                pos += len;
            }
        }
        _ => {
            return Err(Error::invalid_wire_format(
                offset,
                format!("repeated int32: unexpected wire type {wt:?}"),
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use prost_types::field_descriptor_proto::{Label as PbLabel, Type as PbType};
    use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};

    fn sample_proto() -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("foo.proto".to_string()),
            package: Some("pkg".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Foo".to_string()),
                field: vec![FieldDescriptorProto {
                    name: Some("bar".to_string()),
                    number: Some(1),
                    label: Some(PbLabel::Optional as i32),
                    r#type: Some(PbType::Int32 as i32),
                    json_name: Some("bar".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn encode(proto: &FileDescriptorProto) -> Vec<u8> {
        let mut buf = Vec::new();
        proto.encode(&mut buf).expect("encoding cannot fail");
        buf
    }

    #[test]
    fn test_decode_simple_file() {
        let fd = decode(&encode(&sample_proto())).unwrap();
        assert_eq!(fd.name, "foo.proto");
        assert_eq!(fd.package, "pkg");
        assert_eq!(fd.syntax, Syntax::Proto3);
        assert_eq!(fd.message_type.len(), 1);
        let msg = &fd.message_type[0];
        assert_eq!(msg.name, "Foo");
        assert_eq!(msg.field.len(), 1);
        assert_eq!(msg.field[0].name, "bar");
        assert_eq!(msg.field[0].number, 1);
        assert_eq!(msg.field[0].field_type, FieldType::Int32);
    }

    #[test]
    fn test_decode_missing_name_fails() {
        let proto = FileDescriptorProto {
            package: Some("pkg".to_string()),
            ..Default::default()
        };
        assert!(decode(&encode(&proto)).is_err());
    }

    #[test]
    fn test_decode_unknown_field_skipped() {
        // Append field 999 (varint) after a valid descriptor; strict decode
        // must still consume the whole buffer.
        let mut bytes = encode(&sample_proto());
        let tag = 999u64 << 3; // wire type 0 (varint)
        push_varint(&mut bytes, tag);
        push_varint(&mut bytes, 42);
        let fd = decode(&bytes).unwrap();
        assert_eq!(fd.name, "foo.proto");
    }

    #[test]
    fn test_decode_truncation_never_panics() {
        let bytes = encode(&sample_proto());
        for cut in 0..bytes.len() {
            // Mid-field truncations must error; boundary truncations may
            // decode a shorter but well-formed prefix. Either way, no panic.
            let _ = decode(&bytes[..cut]);
        }
    }

    #[test]
    fn test_decode_truncated_string_errors() {
        // 0x0A (field 1, LEN), length 9, only 3 bytes of payload
        let bytes = [0x0A, 0x09, b'f', b'o', b'o'];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_wire_type_mismatch_errors() {
        // Valid name field, then package (field 2) with varint wire type
        let mut bytes = vec![0x0A, 0x07];
        bytes.extend_from_slice(b"a.proto");
        bytes.extend_from_slice(&[0x10, 0x05]);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_prefix_stops_at_adjacent_descriptor() {
        let first = encode(&sample_proto());
        let mut second_proto = sample_proto();
        second_proto.name = Some("other.proto".to_string());
        let second = encode(&second_proto);

        let mut joined = first.clone();
        joined.extend_from_slice(&second);

        let (fd, consumed) = decode_prefix(&joined).unwrap();
        assert_eq!(fd.name, "foo.proto");
        assert_eq!(consumed, first.len());

        let (fd2, consumed2) = decode_prefix(&joined[consumed..]).unwrap();
        assert_eq!(fd2.name, "other.proto");
        assert_eq!(consumed2, second.len());
    }

    #[test]
    fn test_decode_prefix_stops_at_nul_terminator() {
        // Embedded descriptors are NUL-terminated C strings; the trailing
        // zero bytes are not part of the record.
        let clean = encode(&sample_proto());
        let mut stored = clean.clone();
        stored.extend_from_slice(&[0x00; 4]);
        let (fd, consumed) = decode_prefix(&stored).unwrap();
        assert_eq!(fd.name, "foo.proto");
        assert_eq!(consumed, clean.len());
    }

    #[test]
    fn test_decode_prefix_stops_at_garbage() {
        let clean = encode(&sample_proto());
        let mut noisy = clean.clone();
        noisy.extend_from_slice(&[0xFF; 16]);
        let (fd, consumed) = decode_prefix(&noisy).unwrap();
        assert_eq!(fd.name, "foo.proto");
        assert_eq!(consumed, clean.len());
    }

    #[test]
    fn test_decode_recursion_limit() {
        let mut inner = DescriptorProto {
            name: Some("M".to_string()),
            ..Default::default()
        };
        for _ in 0..(MAX_RECURSION_DEPTH + 4) {
            inner = DescriptorProto {
                name: Some("M".to_string()),
                nested_type: vec![inner],
                ..Default::default()
            };
        }
        let proto = FileDescriptorProto {
            name: Some("deep.proto".to_string()),
            message_type: vec![inner],
            ..Default::default()
        };
        match decode(&encode(&proto)) {
            Err(Error::RecursionLimit { .. }) => {}
            // Top-level salvage converts the nested failure into a
            // trailing-bytes report; both are acceptable decode failures.
            Err(_) => {}
            Ok(_) => panic!("expected decode failure on over-deep nesting"),
        }
    }

    #[test]
    fn test_decode_structural_violation_demoted() {
        // Two fields with the same number decode cleanly but fail validation.
        let proto = FileDescriptorProto {
            name: Some("dup.proto".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Foo".to_string()),
                field: vec![
                    FieldDescriptorProto {
                        name: Some("a".to_string()),
                        number: Some(1),
                        label: Some(PbLabel::Optional as i32),
                        r#type: Some(PbType::Int32 as i32),
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: Some("b".to_string()),
                        number: Some(1),
                        label: Some(PbLabel::Optional as i32),
                        r#type: Some(PbType::Int32 as i32),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        match decode(&encode(&proto)) {
            Err(Error::StructuralViolation { .. }) => {}
            other => panic!("expected structural violation, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_public_dependency() {
        let proto = FileDescriptorProto {
            name: Some("b.proto".to_string()),
            dependency: vec!["a.proto".to_string(), "c.proto".to_string()],
            public_dependency: vec![1],
            ..Default::default()
        };
        let fd = decode(&encode(&proto)).unwrap();
        assert_eq!(fd.dependency, vec!["a.proto", "c.proto"]);
        assert_eq!(fd.public_dependency, vec![1]);
    }

    fn push_varint(buf: &mut Vec<u8>, mut v: u64) {
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                buf.push(byte);
                break;
            }
            buf.push(byte | 0x80);
        }
    }
}
