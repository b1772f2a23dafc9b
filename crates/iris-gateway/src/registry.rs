// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command registry: kind → builder dispatch.
//!
//! Each registered [`CommandSpec`] pairs a command kind with its target
//! message type and a pure mapper from parameter bag to field tree. The
//! mapper performs exactly the coercions its command needs (enum symbol
//! lookup, numeric extraction) and touches neither the transport nor any
//! other state — which is what keeps the registry testable without a live
//! connection.

use crate::request::{MappingError, ParamBag};
use iris_proto::{FieldTree, MessageHandle};
use std::collections::HashMap;
use thiserror::Error;

/// Error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A spec under this kind is already registered.
    #[error("command kind `{0}` is already registered")]
    DuplicateKind(String),
    /// No spec is registered under this kind.
    #[error("unknown command kind `{0}`")]
    UnknownKind(String),
    /// The kind's mapper rejected the parameter bag.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

type Mapper = Box<dyn Fn(&ParamBag) -> Result<FieldTree, MappingError> + Send + Sync>;

/// Registered mapping from one command kind to its wire shape.
pub struct CommandSpec {
    kind: String,
    target: MessageHandle,
    mapper: Mapper,
}

impl CommandSpec {
    /// Create a spec from its parts. The mapper must be pure: same bag in,
    /// same tree out.
    pub fn new(
        kind: impl Into<String>,
        target: MessageHandle,
        mapper: impl Fn(&ParamBag) -> Result<FieldTree, MappingError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: kind.into(),
            target,
            mapper: Box::new(mapper),
        }
    }

    /// Command kind this spec is registered under.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Message type the mapper's trees are encoded against.
    pub fn target(&self) -> &MessageHandle {
        &self.target
    }

    /// Run the mapper over a parameter bag.
    pub fn map(&self, params: &ParamBag) -> Result<FieldTree, MappingError> {
        (self.mapper)(params)
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("kind", &self.kind)
            .field("target", &self.target.name())
            .finish_non_exhaustive()
    }
}

/// Kind-keyed collection of command specs. Populated once at startup,
/// immutable afterwards.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    specs: HashMap<String, CommandSpec>,
}

impl CommandRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec. Duplicate kinds are a hard error, not a replace.
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), RegistryError> {
        if self.specs.contains_key(spec.kind()) {
            return Err(RegistryError::DuplicateKind(spec.kind().to_string()));
        }
        self.specs.insert(spec.kind().to_string(), spec);
        Ok(())
    }

    /// Look up a spec by kind.
    pub fn spec(&self, kind: &str) -> Result<&CommandSpec, RegistryError> {
        self.specs
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    /// Build the field tree for one request. Never returns a partial tree:
    /// any mapper failure surfaces as an error.
    pub fn build(&self, kind: &str, params: &ParamBag) -> Result<FieldTree, RegistryError> {
        Ok(self.spec(kind)?.map(params)?)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_proto::{SchemaCatalog, Value};
    use serde_json::json;

    fn fixture() -> (SchemaCatalog, MessageHandle) {
        let catalog =
            SchemaCatalog::parse("message SetAirTemp { int32 temperature = 1; }").unwrap();
        let handle = catalog.message("SetAirTemp").unwrap();
        (catalog, handle)
    }

    fn temp_spec(handle: &MessageHandle) -> CommandSpec {
        CommandSpec::new("setAirTemp", handle.clone(), |params| {
            Ok(FieldTree::new().with("temperature", Value::Int(params.int("temperature")?)))
        })
    }

    #[test]
    fn build_runs_the_registered_mapper() {
        let (_catalog, handle) = fixture();
        let mut registry = CommandRegistry::new();
        registry.register(temp_spec(&handle)).unwrap();

        let bag = ParamBag::new().with("temperature", json!(21));
        let tree = registry.build("setAirTemp", &bag).unwrap();
        assert_eq!(tree.get("temperature"), Some(&Value::Int(21)));
    }

    #[test]
    fn duplicate_kind_is_rejected() {
        let (_catalog, handle) = fixture();
        let mut registry = CommandRegistry::new();
        registry.register(temp_spec(&handle)).unwrap();
        let err = registry.register(temp_spec(&handle)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKind(kind) if kind == "setAirTemp"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let registry = CommandRegistry::new();
        let err = registry.build("setZoom", &ParamBag::new()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownKind(kind) if kind == "setZoom"));
    }

    #[test]
    fn mapper_failures_propagate() {
        let (_catalog, handle) = fixture();
        let mut registry = CommandRegistry::new();
        registry.register(temp_spec(&handle)).unwrap();

        let err = registry.build("setAirTemp", &ParamBag::new()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Mapping(MappingError::Missing(field)) if field == "temperature"
        ));
    }
}
