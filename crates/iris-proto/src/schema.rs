// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime schema catalog.
//!
//! Parses a proto3-style schema text into message and enum descriptors.
//! Parsing is two-pass: a syntax pass builds raw declarations, a resolution
//! pass turns type references into handles (enums) or validated names
//! (messages — kept by name so recursive shapes need no reference cycles).
//! The catalog is immutable after [`SchemaCatalog::parse`] and safe to read
//! from any thread.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Largest field number proto3 allows (2^29 - 1).
const MAX_FIELD_NUMBER: i64 = 536_870_911;

/// Error type for schema loading and lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema text is not well-formed.
    #[error("schema parse error at line {line}: {message}")]
    Parse {
        /// 1-based source line of the offending token.
        line: usize,
        /// What went wrong.
        message: String,
    },
    /// A named type is absent from the catalog (lookup or unresolved
    /// reference during load).
    #[error("unknown type `{0}`")]
    UnknownType(String),
}

type Result<T> = std::result::Result<T, SchemaError>;

/// Named enumeration: symbolic member names mapped to wire integers.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumDescriptor {
    name: String,
    members: Vec<(String, i32)>,
}

/// Shared, immutable reference to one enum.
pub type EnumHandle = Arc<EnumDescriptor>;

impl EnumDescriptor {
    /// Enum type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in declaration order.
    pub fn members(&self) -> &[(String, i32)] {
        &self.members
    }

    /// Wire value for a symbolic member name.
    pub fn value_of(&self, member: &str) -> Option<i32> {
        self.members
            .iter()
            .find(|(n, _)| n == member)
            .map(|(_, v)| *v)
    }

    /// Symbolic name for a wire value.
    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    /// Default member: the one with value 0, else the first declared.
    pub fn default_member(&self) -> &str {
        self.name_of(0).unwrap_or_else(|| &self.members[0].0)
    }
}

/// What a single field holds on the wire.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Signed 32-bit varint.
    Int32,
    /// Signed 64-bit varint.
    Int64,
    /// Unsigned 32-bit varint.
    Uint32,
    /// 32-bit IEEE float (fixed width).
    Float,
    /// 64-bit IEEE float (fixed width).
    Double,
    /// Length-delimited UTF-8 string.
    Str,
    /// Enum reference, resolved at load time.
    Enum(EnumHandle),
    /// Nested message reference, by type name (resolved through the
    /// catalog; validated to exist at load time).
    Message(String),
}

/// One field of a message.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    kind: FieldKind,
}

impl FieldDescriptor {
    /// Field name, unique within its message.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire field number, unique within its message.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Field kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

/// Named message type: an ordered list of fields.
#[derive(Debug)]
pub struct MessageDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

/// Shared, immutable reference to one message type.
pub type MessageHandle = Arc<MessageDescriptor>;

impl MessageDescriptor {
    /// Message type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order (oneof groups already flattened).
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by wire number.
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.number == number)
    }
}

/// Immutable catalog of all named types in one schema file.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    package: Option<String>,
    messages: HashMap<String, MessageHandle>,
    enums: HashMap<String, EnumHandle>,
}

impl SchemaCatalog {
    /// Parse a schema text into a catalog. Fails on the first syntax error
    /// or unresolved type reference; a failed load leaves nothing usable.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = lex(text)?;
        let raw = parse_declarations(&tokens)?;
        resolve(raw)
    }

    /// Declared package name, if any. Lookups are by bare type name.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Look up a message type by name.
    pub fn message(&self, name: &str) -> Result<MessageHandle> {
        self.messages
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Look up an enum type by name.
    pub fn enum_type(&self, name: &str) -> Result<EnumHandle> {
        self.enums
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }
}

// --- Lexer ----------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(i64),
    Quoted(String),
    Punct(char),
}

#[derive(Debug)]
struct Token {
    kind: TokenKind,
    line: usize,
}

fn lex_err(line: usize, message: impl Into<String>) -> SchemaError {
    SchemaError::Parse {
        line,
        message: message.into(),
    }
}

fn lex(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut line = 1usize;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '\n' => {
                line += 1;
                pos += 1;
            }
            _ if c.is_whitespace() => pos += 1,
            '/' if chars.get(pos + 1) == Some(&'/') => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            '/' if chars.get(pos + 1) == Some(&'*') => {
                pos += 2;
                loop {
                    match (chars.get(pos), chars.get(pos + 1)) {
                        (Some('*'), Some('/')) => {
                            pos += 2;
                            break;
                        }
                        (Some('\n'), _) => {
                            line += 1;
                            pos += 1;
                        }
                        (Some(_), _) => pos += 1,
                        (None, _) => return Err(lex_err(line, "unterminated block comment")),
                    }
                }
            }
            '"' => {
                pos += 1;
                let start = pos;
                while pos < chars.len() && chars[pos] != '"' {
                    if chars[pos] == '\n' {
                        return Err(lex_err(line, "unterminated string literal"));
                    }
                    pos += 1;
                }
                if pos == chars.len() {
                    return Err(lex_err(line, "unterminated string literal"));
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(chars[start..pos].iter().collect()),
                    line,
                });
                pos += 1;
            }
            '{' | '}' | '=' | ';' | '.' => {
                tokens.push(Token {
                    kind: TokenKind::Punct(c),
                    line,
                });
                pos += 1;
            }
            '-' | '0'..='9' => {
                let start = pos;
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                let lit: String = chars[start..pos].iter().collect();
                let value = lit
                    .parse::<i64>()
                    .map_err(|_| lex_err(line, format!("bad integer literal `{lit}`")))?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    line,
                });
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                pos += 1;
                while pos < chars.len()
                    && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_')
                {
                    pos += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..pos].iter().collect()),
                    line,
                });
            }
            _ => return Err(lex_err(line, format!("unexpected character `{c}`"))),
        }
    }

    Ok(tokens)
}

// --- Parser ---------------------------------------------------------------

struct RawField {
    name: String,
    number: u32,
    type_name: String,
    line: usize,
}

struct RawMessage {
    name: String,
    fields: Vec<RawField>,
    line: usize,
}

struct RawEnum {
    name: String,
    members: Vec<(String, i32)>,
    line: usize,
}

#[derive(Default)]
struct RawSchema {
    package: Option<String>,
    messages: Vec<RawMessage>,
    enums: Vec<RawEnum>,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_punct(&self, c: char) -> bool {
        matches!(
            self.tokens.get(self.pos),
            Some(Token { kind: TokenKind::Punct(p), .. }) if *p == c
        )
    }

    fn expect_ident(&mut self) -> Result<&'a str> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(name),
            _ => Err(lex_err(self.line(), "expected identifier")),
        }
    }

    fn expect_number(&mut self) -> Result<i64> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Number(n),
                ..
            }) => Ok(*n),
            _ => Err(lex_err(self.line(), "expected integer")),
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Punct(p),
                ..
            }) if *p == c => Ok(()),
            _ => Err(lex_err(self.line(), format!("expected `{c}`"))),
        }
    }
}

fn parse_declarations(tokens: &[Token]) -> Result<RawSchema> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut schema = RawSchema::default();

    while parser.pos < tokens.len() {
        let line = parser.line();
        let keyword = parser.expect_ident()?;
        match keyword {
            "syntax" => {
                parser.expect_punct('=')?;
                match parser.next() {
                    Some(Token {
                        kind: TokenKind::Quoted(s),
                        ..
                    }) if s == "proto3" => {}
                    _ => return Err(lex_err(line, "only `syntax = \"proto3\"` is supported")),
                }
                parser.expect_punct(';')?;
            }
            "package" => {
                let mut name = parser.expect_ident()?.to_string();
                while parser.peek_punct('.') {
                    parser.expect_punct('.')?;
                    name.push('.');
                    name.push_str(parser.expect_ident()?);
                }
                parser.expect_punct(';')?;
                schema.package = Some(name);
            }
            "enum" => schema.enums.push(parse_enum(&mut parser, line)?),
            "message" => schema.messages.push(parse_message(&mut parser, line)?),
            other => {
                return Err(lex_err(line, format!("unexpected declaration `{other}`")));
            }
        }
    }

    Ok(schema)
}

fn parse_enum(parser: &mut Parser<'_>, line: usize) -> Result<RawEnum> {
    let name = parser.expect_ident()?.to_string();
    parser.expect_punct('{')?;
    let mut members = Vec::new();

    while !parser.peek_punct('}') {
        let member_line = parser.line();
        let member = parser.expect_ident()?.to_string();
        parser.expect_punct('=')?;
        let value = parser.expect_number()?;
        parser.expect_punct(';')?;
        let value = i32::try_from(value)
            .map_err(|_| lex_err(member_line, format!("enum value {value} out of i32 range")))?;
        if members.iter().any(|(n, _)| *n == member) {
            return Err(lex_err(
                member_line,
                format!("duplicate enum member `{member}`"),
            ));
        }
        members.push((member, value));
    }
    parser.expect_punct('}')?;

    if members.is_empty() {
        return Err(lex_err(line, format!("enum `{name}` has no members")));
    }
    Ok(RawEnum {
        name,
        members,
        line,
    })
}

fn parse_message(parser: &mut Parser<'_>, line: usize) -> Result<RawMessage> {
    let name = parser.expect_ident()?.to_string();
    parser.expect_punct('{')?;
    let mut fields = Vec::new();

    while !parser.peek_punct('}') {
        let field_line = parser.line();
        let first = parser.expect_ident()?.to_string();
        if first == "oneof" {
            // oneof groups flatten into the parent: the encoder only ever
            // emits populated fields, which is the oneof wire behavior.
            parser.expect_ident()?;
            parser.expect_punct('{')?;
            while !parser.peek_punct('}') {
                fields.push(parse_field(parser)?);
            }
            parser.expect_punct('}')?;
        } else {
            fields.push(parse_field_with_type(parser, first, field_line)?);
        }
    }
    parser.expect_punct('}')?;

    for (i, field) in fields.iter().enumerate() {
        for later in &fields[i + 1..] {
            if field.name == later.name {
                return Err(lex_err(
                    later.line,
                    format!("duplicate field name `{}`", later.name),
                ));
            }
            if field.number == later.number {
                return Err(lex_err(
                    later.line,
                    format!("duplicate field number {}", later.number),
                ));
            }
        }
    }

    Ok(RawMessage {
        name,
        fields,
        line,
    })
}

fn parse_field(parser: &mut Parser<'_>) -> Result<RawField> {
    let line = parser.line();
    let type_name = parser.expect_ident()?.to_string();
    parse_field_with_type(parser, type_name, line)
}

fn parse_field_with_type(
    parser: &mut Parser<'_>,
    type_name: String,
    line: usize,
) -> Result<RawField> {
    let name = parser.expect_ident()?.to_string();
    parser.expect_punct('=')?;
    let number = parser.expect_number()?;
    parser.expect_punct(';')?;
    if number < 1 || number > MAX_FIELD_NUMBER {
        return Err(lex_err(line, format!("field number {number} out of range")));
    }
    Ok(RawField {
        name,
        number: u32::try_from(number).map_err(|_| lex_err(line, "field number out of range"))?,
        type_name,
        line,
    })
}

// --- Resolution -----------------------------------------------------------

fn resolve(raw: RawSchema) -> Result<SchemaCatalog> {
    let mut enums: HashMap<String, EnumHandle> = HashMap::new();
    for e in raw.enums {
        if enums.contains_key(&e.name) {
            return Err(lex_err(e.line, format!("duplicate type name `{}`", e.name)));
        }
        enums.insert(
            e.name.clone(),
            Arc::new(EnumDescriptor {
                name: e.name,
                members: e.members,
            }),
        );
    }

    let message_names: Vec<String> = raw.messages.iter().map(|m| m.name.clone()).collect();
    let mut messages: HashMap<String, MessageHandle> = HashMap::new();
    for m in raw.messages {
        if enums.contains_key(&m.name) || messages.contains_key(&m.name) {
            return Err(lex_err(m.line, format!("duplicate type name `{}`", m.name)));
        }
        let mut fields = Vec::with_capacity(m.fields.len());
        for f in m.fields {
            let kind = match f.type_name.as_str() {
                "int32" => FieldKind::Int32,
                "int64" => FieldKind::Int64,
                "uint32" => FieldKind::Uint32,
                "float" => FieldKind::Float,
                "double" => FieldKind::Double,
                "string" => FieldKind::Str,
                other => {
                    if let Some(handle) = enums.get(other) {
                        FieldKind::Enum(handle.clone())
                    } else if message_names.iter().any(|n| n == other) {
                        FieldKind::Message(other.to_string())
                    } else {
                        return Err(SchemaError::UnknownType(other.to_string()));
                    }
                }
            };
            fields.push(FieldDescriptor {
                name: f.name,
                number: f.number,
                kind,
            });
        }
        messages.insert(
            m.name.clone(),
            Arc::new(MessageDescriptor {
                name: m.name,
                fields,
            }),
        );
    }

    Ok(SchemaCatalog {
        package: raw.package,
        messages,
        enums,
    })
}
