// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime message schema and binary codec for the iris command gateway.
//!
//! The message shapes this crate works with are not known at compile time:
//! a schema text (proto3-style subset) is parsed at startup into a
//! [`SchemaCatalog`], and every encode/decode is validated against the
//! resulting descriptors. Field contents travel as dynamically tagged
//! [`FieldTree`] values rather than generated structs.

pub mod codec;
pub mod schema;
pub mod tree;

pub use codec::{decode, encode, CodecError};
pub use schema::{
    EnumDescriptor, EnumHandle, FieldDescriptor, FieldKind, MessageDescriptor, MessageHandle,
    SchemaCatalog, SchemaError,
};
pub use tree::{FieldTree, Value};
