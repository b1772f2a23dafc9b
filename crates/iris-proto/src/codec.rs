// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema-driven binary message codec.
//!
//! Wire rules are proto3-compatible: each present field is encoded as
//! `tag || value` with `tag = (number << 3) | wire_type`.
//!
//! * wire type 0 (varint) — `int32`, `int64`, `uint32`, enums; negative
//!   values are sign-extended to 64 bits
//! * wire type 1 (fixed 64-bit LE) — `double`
//! * wire type 2 (length-delimited) — `string`, nested messages
//! * wire type 5 (fixed 32-bit LE) — `float`
//!
//! Encoding validates the whole tree against the descriptor first; nothing
//! is serialized from a tree that fails validation. Decoding skips unknown
//! field numbers, rejects wire-type mismatches and truncation, renders enums
//! as symbolic names, and fills schema defaults for absent scalar fields.

use crate::schema::{FieldKind, MessageHandle, SchemaCatalog};
use crate::tree::{FieldTree, Value};
use thiserror::Error;

const WIRE_VARINT: u32 = 0;
const WIRE_FIXED64: u32 = 1;
const WIRE_LEN: u32 = 2;
const WIRE_FIXED32: u32 = 5;

/// Error type for encode/decode operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The field tree does not conform to the target descriptor. `path` is
    /// the dotted path of the offending field.
    #[error("validation failed at `{path}`: {reason}")]
    Validation {
        /// Dotted field path (e.g. `command.setZoom.zoomLevel`).
        path: String,
        /// What did not conform.
        reason: String,
    },
    /// The byte sequence cannot be parsed against the descriptor.
    #[error("malformed frame: {reason}")]
    Malformed {
        /// What could not be parsed.
        reason: String,
    },
}

type Result<T> = std::result::Result<T, CodecError>;

fn validation_err(path: &[&str], reason: impl Into<String>) -> CodecError {
    CodecError::Validation {
        path: path.join("."),
        reason: reason.into(),
    }
}

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::Malformed {
        reason: reason.into(),
    }
}

// --- Validation -----------------------------------------------------------

/// Check a field tree against a message descriptor without serializing.
///
/// Every field present in the tree must exist in the descriptor, carry a
/// value of the declared kind, fit the declared width, and (for enums) name
/// an existing member. Runs on every [`encode`] call.
pub fn validate(catalog: &SchemaCatalog, message: &MessageHandle, tree: &FieldTree) -> Result<()> {
    let mut path = Vec::new();
    validate_at(catalog, message, tree, &mut path)
}

fn validate_at<'t>(
    catalog: &SchemaCatalog,
    message: &MessageHandle,
    tree: &'t FieldTree,
    path: &mut Vec<&'t str>,
) -> Result<()> {
    for (name, value) in tree.iter() {
        path.push(name);
        let field = message
            .field(name)
            .ok_or_else(|| validation_err(path, format!("no such field in {}", message.name())))?;
        match (field.kind(), value) {
            (FieldKind::Int32, Value::Int(n)) => {
                if i32::try_from(*n).is_err() {
                    return Err(validation_err(path, format!("{n} out of int32 range")));
                }
            }
            (FieldKind::Uint32, Value::Int(n)) => {
                if u32::try_from(*n).is_err() {
                    return Err(validation_err(path, format!("{n} out of uint32 range")));
                }
            }
            (FieldKind::Int64, Value::Int(_)) => {}
            (FieldKind::Float | FieldKind::Double, Value::Float(_)) => {}
            (FieldKind::Str, Value::Text(_)) => {}
            (FieldKind::Enum(handle), Value::Symbol(symbol)) => {
                if handle.value_of(symbol).is_none() {
                    return Err(validation_err(
                        path,
                        format!("`{symbol}` is not a member of enum {}", handle.name()),
                    ));
                }
            }
            (FieldKind::Message(type_name), Value::Tree(nested)) => {
                let nested_message = catalog
                    .message(type_name)
                    .map_err(|_| validation_err(path, format!("unresolved type {type_name}")))?;
                validate_at(catalog, &nested_message, nested, path)?;
            }
            (kind, value) => {
                return Err(validation_err(
                    path,
                    format!(
                        "expected {} value, got {}",
                        kind_label(kind),
                        value.kind_label()
                    ),
                ));
            }
        }
        path.pop();
    }
    Ok(())
}

fn kind_label(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Int32 => "int32",
        FieldKind::Int64 => "int64",
        FieldKind::Uint32 => "uint32",
        FieldKind::Float => "float",
        FieldKind::Double => "double",
        FieldKind::Str => "string",
        FieldKind::Enum(_) => "enum symbol",
        FieldKind::Message(_) => "message",
    }
}

// --- Encoder --------------------------------------------------------------

/// Validate and serialize a field tree against a message descriptor.
pub fn encode(
    catalog: &SchemaCatalog,
    message: &MessageHandle,
    tree: &FieldTree,
) -> Result<Vec<u8>> {
    validate(catalog, message, tree)?;
    let mut out = Vec::new();
    encode_into(catalog, message, tree, &mut out)?;
    Ok(out)
}

fn encode_into(
    catalog: &SchemaCatalog,
    message: &MessageHandle,
    tree: &FieldTree,
    out: &mut Vec<u8>,
) -> Result<()> {
    // Serialize in schema declaration order, not tree insertion order.
    for field in message.fields() {
        let Some(value) = tree.get(field.name()) else {
            continue;
        };
        match (field.kind(), value) {
            (FieldKind::Int32 | FieldKind::Int64 | FieldKind::Uint32, Value::Int(n)) => {
                put_tag(out, field.number(), WIRE_VARINT);
                put_varint(out, *n as u64);
            }
            (FieldKind::Enum(handle), Value::Symbol(symbol)) => {
                // Membership was checked during validation.
                let code = handle.value_of(symbol).unwrap_or_default();
                put_tag(out, field.number(), WIRE_VARINT);
                put_varint(out, i64::from(code) as u64);
            }
            (FieldKind::Float, Value::Float(x)) => {
                put_tag(out, field.number(), WIRE_FIXED32);
                out.extend_from_slice(&(*x as f32).to_le_bytes());
            }
            (FieldKind::Double, Value::Float(x)) => {
                put_tag(out, field.number(), WIRE_FIXED64);
                out.extend_from_slice(&x.to_le_bytes());
            }
            (FieldKind::Str, Value::Text(s)) => {
                put_tag(out, field.number(), WIRE_LEN);
                put_varint(out, s.len() as u64);
                out.extend_from_slice(s.as_bytes());
            }
            (FieldKind::Message(type_name), Value::Tree(nested)) => {
                let nested_message = catalog
                    .message(type_name)
                    .map_err(|_| malformed(format!("unresolved type {type_name}")))?;
                let mut buf = Vec::new();
                encode_into(catalog, &nested_message, nested, &mut buf)?;
                put_tag(out, field.number(), WIRE_LEN);
                put_varint(out, buf.len() as u64);
                out.extend_from_slice(&buf);
            }
            // Kind mismatches were rejected during validation.
            _ => {}
        }
    }
    Ok(())
}

fn put_tag(out: &mut Vec<u8>, number: u32, wire_type: u32) {
    put_varint(out, u64::from((number << 3) | wire_type));
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

// --- Decoder --------------------------------------------------------------

/// Parse a wire frame against a message descriptor.
///
/// Unknown field numbers are skipped; absence of a declared scalar, string,
/// or enum field is not an error — the schema default is filled in. Absent
/// nested messages stay absent.
pub fn decode(catalog: &SchemaCatalog, message: &MessageHandle, bytes: &[u8]) -> Result<FieldTree> {
    let mut seen = FieldTree::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let tag = read_varint(bytes, &mut pos)?;
        let number = u32::try_from(tag >> 3).map_err(|_| malformed("field number overflow"))?;
        let wire_type = (tag & 0x7) as u32;

        let Some(field) = message.field_by_number(number) else {
            skip_value(bytes, &mut pos, wire_type)?;
            continue;
        };

        let expected = wire_type_for(field.kind());
        if wire_type != expected {
            return Err(malformed(format!(
                "field `{}` of {}: wire type {wire_type}, expected {expected}",
                field.name(),
                message.name()
            )));
        }

        let value = match field.kind() {
            FieldKind::Int32 => {
                let raw = read_varint(bytes, &mut pos)?;
                Value::Int(i64::from((raw & 0xffff_ffff) as u32 as i32))
            }
            FieldKind::Int64 => Value::Int(read_varint(bytes, &mut pos)? as i64),
            FieldKind::Uint32 => {
                let raw = read_varint(bytes, &mut pos)?;
                Value::Int(i64::from((raw & 0xffff_ffff) as u32))
            }
            FieldKind::Enum(handle) => {
                let raw = read_varint(bytes, &mut pos)?;
                let code = (raw & 0xffff_ffff) as u32 as i32;
                let symbol = handle.name_of(code).ok_or_else(|| {
                    malformed(format!(
                        "unknown value {code} for enum {} in field `{}`",
                        handle.name(),
                        field.name()
                    ))
                })?;
                Value::symbol(symbol)
            }
            FieldKind::Float => {
                let raw = read_exact::<4>(bytes, &mut pos)?;
                Value::Float(f64::from(f32::from_le_bytes(raw)))
            }
            FieldKind::Double => {
                let raw = read_exact::<8>(bytes, &mut pos)?;
                Value::Float(f64::from_le_bytes(raw))
            }
            FieldKind::Str => {
                let slice = read_len_delimited(bytes, &mut pos)?;
                let text = std::str::from_utf8(slice)
                    .map_err(|_| malformed(format!("field `{}`: invalid utf-8", field.name())))?;
                Value::text(text)
            }
            FieldKind::Message(type_name) => {
                let slice = read_len_delimited(bytes, &mut pos)?;
                let nested_message = catalog
                    .message(type_name)
                    .map_err(|_| malformed(format!("unresolved type {type_name}")))?;
                Value::Tree(decode(catalog, &nested_message, slice)?)
            }
        };
        // Repeated occurrences of a scalar field: last one wins.
        seen.insert(field.name(), value);
    }

    // Re-emit in schema order with defaults for absent scalar fields.
    let mut out = FieldTree::new();
    for field in message.fields() {
        if let Some(value) = seen.get(field.name()) {
            out.insert(field.name(), value.clone());
            continue;
        }
        match field.kind() {
            FieldKind::Int32 | FieldKind::Int64 | FieldKind::Uint32 => {
                out.insert(field.name(), Value::Int(0));
            }
            FieldKind::Float | FieldKind::Double => out.insert(field.name(), Value::Float(0.0)),
            FieldKind::Str => out.insert(field.name(), Value::text("")),
            FieldKind::Enum(handle) => {
                out.insert(field.name(), Value::symbol(handle.default_member()));
            }
            FieldKind::Message(_) => {}
        }
    }
    Ok(out)
}

fn wire_type_for(kind: &FieldKind) -> u32 {
    match kind {
        FieldKind::Int32 | FieldKind::Int64 | FieldKind::Uint32 | FieldKind::Enum(_) => {
            WIRE_VARINT
        }
        FieldKind::Double => WIRE_FIXED64,
        FieldKind::Str | FieldKind::Message(_) => WIRE_LEN,
        FieldKind::Float => WIRE_FIXED32,
    }
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    for shift in 0..10 {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| malformed("truncated varint"))?;
        *pos += 1;
        value |= u64::from(byte & 0x7f) << (shift * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(malformed("varint longer than 10 bytes"))
}

fn read_exact<const N: usize>(bytes: &[u8], pos: &mut usize) -> Result<[u8; N]> {
    let end = pos
        .checked_add(N)
        .ok_or_else(|| malformed("length overflow"))?;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| malformed("truncated fixed-width value"))?;
    *pos = end;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

fn read_len_delimited<'b>(bytes: &'b [u8], pos: &mut usize) -> Result<&'b [u8]> {
    let len = read_varint(bytes, pos)?;
    let len = usize::try_from(len).map_err(|_| malformed("length overflow"))?;
    let end = pos
        .checked_add(len)
        .ok_or_else(|| malformed("length overflow"))?;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| malformed("truncated length-delimited value"))?;
    *pos = end;
    Ok(slice)
}

fn skip_value(bytes: &[u8], pos: &mut usize, wire_type: u32) -> Result<()> {
    match wire_type {
        WIRE_VARINT => {
            read_varint(bytes, pos)?;
        }
        WIRE_FIXED64 => {
            read_exact::<8>(bytes, pos)?;
        }
        WIRE_LEN => {
            read_len_delimited(bytes, pos)?;
        }
        WIRE_FIXED32 => {
            read_exact::<4>(bytes, pos)?;
        }
        other => return Err(malformed(format!("unsupported wire type {other}"))),
    }
    Ok(())
}
