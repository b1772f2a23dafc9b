// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-request surface consumed from the UI collaborator.
//!
//! A request is `{ "commandType": "...", ...named scalar parameters }` — the
//! parameter names and types are whatever the registered mapper for that
//! kind expects. The typed getters here are where loose JSON turns into
//! checked values; an unknown enum symbol or a wrong-typed parameter is a
//! [`MappingError`], never a silent default.

use iris_proto::EnumHandle;
use serde::Deserialize;
use thiserror::Error;

/// Error raised while mapping a parameter bag into a field tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// A parameter the mapper needs is absent.
    #[error("missing parameter `{0}`")]
    Missing(String),
    /// A parameter is present with the wrong JSON type.
    #[error("parameter `{field}`: expected {expected}")]
    Kind {
        /// Offending parameter name.
        field: String,
        /// What the mapper expected ("integer", "number", "string").
        expected: &'static str,
    },
    /// A symbolic enum name has no member in the target enumeration.
    #[error("parameter `{field}`: `{symbol}` is not a member of enum {enum_name}")]
    UnknownSymbol {
        /// Offending parameter name.
        field: String,
        /// The symbol the caller sent.
        symbol: String,
        /// The enumeration it was checked against.
        enum_name: String,
    },
}

/// Flat bag of named scalar parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ParamBag(serde_json::Map<String, serde_json::Value>);

impl ParamBag {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter (builder style, mostly for tests and the CLI).
    #[must_use]
    pub fn with(mut self, name: &str, value: serde_json::Value) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    /// Integer parameter.
    pub fn int(&self, name: &str) -> Result<i64, MappingError> {
        self.0
            .get(name)
            .ok_or_else(|| MappingError::Missing(name.to_string()))?
            .as_i64()
            .ok_or_else(|| MappingError::Kind {
                field: name.to_string(),
                expected: "integer",
            })
    }

    /// Floating-point parameter (integers are accepted).
    pub fn float(&self, name: &str) -> Result<f64, MappingError> {
        self.0
            .get(name)
            .ok_or_else(|| MappingError::Missing(name.to_string()))?
            .as_f64()
            .ok_or_else(|| MappingError::Kind {
                field: name.to_string(),
                expected: "number",
            })
    }

    /// String parameter.
    pub fn text(&self, name: &str) -> Result<&str, MappingError> {
        self.0
            .get(name)
            .ok_or_else(|| MappingError::Missing(name.to_string()))?
            .as_str()
            .ok_or_else(|| MappingError::Kind {
                field: name.to_string(),
                expected: "string",
            })
    }

    /// Enum-symbol parameter, checked against the target enumeration.
    pub fn symbol(&self, name: &str, target: &EnumHandle) -> Result<String, MappingError> {
        let symbol = self.text(name)?;
        if target.value_of(symbol).is_none() {
            return Err(MappingError::UnknownSymbol {
                field: name.to_string(),
                symbol: symbol.to_string(),
                enum_name: target.name().to_string(),
            });
        }
        Ok(symbol.to_string())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for ParamBag {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// One command request as emitted by the UI collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Registered command kind.
    #[serde(rename = "commandType")]
    pub command_type: String,
    /// Everything else in the request object.
    #[serde(flatten)]
    pub params: ParamBag,
}

impl CommandRequest {
    /// Request with an empty parameter bag.
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            params: ParamBag::new(),
        }
    }

    /// Set a parameter (builder style).
    #[must_use]
    pub fn with(mut self, name: &str, value: serde_json::Value) -> Self {
        self.params = self.params.with(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_proto::SchemaCatalog;
    use serde_json::json;

    #[test]
    fn deserializes_flattened_request() {
        let request: CommandRequest =
            serde_json::from_value(json!({ "commandType": "setZoom", "zoomLevel": "ZOOM_X2" }))
                .unwrap();
        assert_eq!(request.command_type, "setZoom");
        assert_eq!(request.params.text("zoomLevel").unwrap(), "ZOOM_X2");
    }

    #[test]
    fn typed_getters_report_the_offending_field() {
        let bag = ParamBag::new().with("speed", json!("fast"));
        assert_eq!(bag.int("direction"), Err(MappingError::Missing("direction".into())));
        assert_eq!(
            bag.int("speed"),
            Err(MappingError::Kind {
                field: "speed".into(),
                expected: "integer",
            })
        );
    }

    #[test]
    fn symbol_getter_rejects_non_members() {
        let catalog = SchemaCatalog::parse("enum Zoom { ZOOM_X1 = 0; ZOOM_X2 = 1; }").unwrap();
        let zoom = catalog.enum_type("Zoom").unwrap();

        let bag = ParamBag::new().with("zoomLevel", json!("ZOOM_X9"));
        assert_eq!(
            bag.symbol("zoomLevel", &zoom),
            Err(MappingError::UnknownSymbol {
                field: "zoomLevel".into(),
                symbol: "ZOOM_X9".into(),
                enum_name: "Zoom".into(),
            })
        );

        let bag = ParamBag::new().with("zoomLevel", json!("ZOOM_X2"));
        assert_eq!(bag.symbol("zoomLevel", &zoom).unwrap(), "ZOOM_X2");
    }
}
