// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The standard device command set.
//!
//! Every mapper wraps its message in the `ClientPayload.command.<branch>`
//! envelope — the host only ever receives the top-level client payload with
//! exactly one command branch populated. Branch names follow the wire
//! schema, which is why a few differ from their command kind (`setAirTemp`
//! maps onto the `setAirTC` branch).
//!
//! Enum handles are resolved once, here, against the loaded catalog; a
//! schema missing a referenced enum fails registration instead of failing
//! the first submit.

use crate::registry::{CommandRegistry, CommandSpec, RegistryError};
use iris_proto::{EnumHandle, FieldTree, MessageHandle, SchemaCatalog, SchemaError, Value};

/// Top-level outbound envelope type name.
pub const CLIENT_ENVELOPE: &str = "ClientPayload";
/// Top-level inbound envelope type name.
pub const HOST_ENVELOPE: &str = "HostPayload";

/// Error raised while assembling the standard command set.
#[derive(Debug, thiserror::Error)]
pub enum StandardSetError {
    /// The catalog is missing a type the standard set references.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Registration failed (duplicate kind — indicates a programming error
    /// in the set itself).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn envelope(branch: &str, inner: FieldTree) -> FieldTree {
    FieldTree::new().with(
        "command",
        Value::Tree(FieldTree::new().with(branch, Value::Tree(inner))),
    )
}

fn empty_command(
    registry: &mut CommandRegistry,
    payload: &MessageHandle,
    kind: &str,
    branch: &'static str,
) -> Result<(), RegistryError> {
    registry.register(CommandSpec::new(kind, payload.clone(), move |_params| {
        Ok(envelope(branch, FieldTree::new()))
    }))
}

fn int_command(
    registry: &mut CommandRegistry,
    payload: &MessageHandle,
    kind: &str,
    branch: &'static str,
    field: &'static str,
    param: &'static str,
) -> Result<(), RegistryError> {
    registry.register(CommandSpec::new(kind, payload.clone(), move |params| {
        Ok(envelope(
            branch,
            FieldTree::new().with(field, Value::Int(params.int(param)?)),
        ))
    }))
}

fn symbol_command(
    registry: &mut CommandRegistry,
    payload: &MessageHandle,
    kind: &str,
    branch: &'static str,
    field: &'static str,
    param: &'static str,
    target: EnumHandle,
) -> Result<(), RegistryError> {
    registry.register(CommandSpec::new(kind, payload.clone(), move |params| {
        Ok(envelope(
            branch,
            FieldTree::new().with(field, Value::Symbol(params.symbol(param, &target)?)),
        ))
    }))
}

/// Build a registry holding the full device command set.
pub fn standard_set(catalog: &SchemaCatalog) -> Result<CommandRegistry, StandardSetError> {
    let payload = catalog.message(CLIENT_ENVELOPE)?;
    let zoom = catalog.enum_type("Zoom")?;
    let scheme = catalog.enum_type("ColorScheme")?;
    let agc = catalog.enum_type("AGCMode")?;
    let button = catalog.enum_type("ButtonEnum")?;
    let direct = catalog.enum_type("CMDDirect")?;

    let mut registry = CommandRegistry::new();

    symbol_command(&mut registry, &payload, "setZoom", "setZoom", "zoomLevel", "zoomLevel", zoom)?;
    symbol_command(&mut registry, &payload, "setPallette", "setPallette", "scheme", "scheme", scheme)?;
    int_command(&mut registry, &payload, "setAirTemp", "setAirTC", "temperature", "temperature")?;
    registry.register(CommandSpec::new("setDst", payload.clone(), |params| {
        Ok(envelope(
            "setDst",
            FieldTree::new().with("distance", Value::Float(params.float("distance")?)),
        ))
    }))?;
    symbol_command(&mut registry, &payload, "setAgc", "setAgc", "mode", "agcMode", agc)?;
    registry.register(CommandSpec::new("setWind", payload.clone(), |params| {
        Ok(envelope(
            "setWind",
            FieldTree::new()
                .with("direction", Value::Int(params.int("direction")?))
                .with("speed", Value::Int(params.int("speed")?)),
        ))
    }))?;
    registry.register(CommandSpec::new("setZeroing", payload.clone(), |params| {
        Ok(envelope(
            "setZeroing",
            FieldTree::new()
                .with("x", Value::Int(params.int("x")?))
                .with("y", Value::Int(params.int("y")?)),
        ))
    }))?;
    int_command(&mut registry, &payload, "setPowderTemp", "setPowderTemp", "temperature", "temperature")?;
    int_command(&mut registry, &payload, "setAirHum", "setAirHum", "humidity", "humidity")?;
    int_command(&mut registry, &payload, "setAirPress", "setAirPress", "pressure", "pressure")?;
    int_command(&mut registry, &payload, "setMagOffset", "setMagOffset", "offset", "offset")?;
    symbol_command(&mut registry, &payload, "buttonPress", "buttonPress", "buttonPressed", "button", button)?;
    symbol_command(&mut registry, &payload, "cmdTrigger", "cmdTrigger", "cmd", "cmd", direct)?;
    empty_command(&mut registry, &payload, "getHostDevStatus", "getHostDevStatus")?;
    empty_command(&mut registry, &payload, "getHostProfile", "getHostProfile")?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{MappingError, ParamBag};
    use crate::registry::RegistryError;
    use serde_json::json;

    const SCHEMA: &str = include_str!("../../../proto/thermal.proto");

    fn registry() -> (SchemaCatalog, CommandRegistry) {
        let catalog = SchemaCatalog::parse(SCHEMA).unwrap();
        let registry = standard_set(&catalog).unwrap();
        (catalog, registry)
    }

    fn branch<'t>(tree: &'t FieldTree, name: &str) -> &'t FieldTree {
        let Some(Value::Tree(command)) = tree.get("command") else {
            panic!("missing command envelope in {tree}");
        };
        let Some(Value::Tree(inner)) = command.get(name) else {
            panic!("missing `{name}` branch in {tree}");
        };
        inner
    }

    #[test]
    fn registers_the_full_device_surface() {
        let (_catalog, registry) = registry();
        assert_eq!(
            registry.kinds(),
            [
                "buttonPress",
                "cmdTrigger",
                "getHostDevStatus",
                "getHostProfile",
                "setAgc",
                "setAirHum",
                "setAirPress",
                "setAirTemp",
                "setDst",
                "setMagOffset",
                "setPallette",
                "setPowderTemp",
                "setWind",
                "setZeroing",
                "setZoom",
            ]
        );
    }

    #[test]
    fn zoom_maps_symbol_into_envelope() {
        let (_catalog, registry) = registry();
        let bag = ParamBag::new().with("zoomLevel", json!("ZOOM_X2"));
        let tree = registry.build("setZoom", &bag).unwrap();
        assert_eq!(
            branch(&tree, "setZoom").get("zoomLevel"),
            Some(&Value::symbol("ZOOM_X2"))
        );
    }

    #[test]
    fn air_temp_kind_maps_onto_the_air_tc_branch() {
        let (_catalog, registry) = registry();
        let bag = ParamBag::new().with("temperature", json!(-40));
        let tree = registry.build("setAirTemp", &bag).unwrap();
        assert_eq!(
            branch(&tree, "setAirTC").get("temperature"),
            Some(&Value::Int(-40))
        );
    }

    #[test]
    fn wind_maps_both_parameters() {
        let (_catalog, registry) = registry();
        let bag = ParamBag::new()
            .with("direction", json!(270))
            .with("speed", json!(15));
        let tree = registry.build("setWind", &bag).unwrap();
        let wind = branch(&tree, "setWind");
        assert_eq!(wind.get("direction"), Some(&Value::Int(270)));
        assert_eq!(wind.get("speed"), Some(&Value::Int(15)));
    }

    #[test]
    fn status_requests_map_to_empty_branches() {
        let (_catalog, registry) = registry();
        let tree = registry.build("getHostProfile", &ParamBag::new()).unwrap();
        assert!(branch(&tree, "getHostProfile").is_empty());
    }

    #[test]
    fn unknown_zoom_symbol_is_a_mapping_error() {
        let (_catalog, registry) = registry();
        let bag = ParamBag::new().with("zoomLevel", json!("ZOOM_X9"));
        let err = registry.build("setZoom", &bag).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Mapping(MappingError::UnknownSymbol { symbol, .. }) if symbol == "ZOOM_X9"
        ));
    }

    #[test]
    fn standard_trees_pass_envelope_validation() {
        let (catalog, registry) = registry();
        let payload = catalog.message(CLIENT_ENVELOPE).unwrap();
        let bag = ParamBag::new().with("distance", json!(150.5));
        let tree = registry.build("setDst", &bag).unwrap();
        iris_proto::codec::validate(&catalog, &payload, &tree).unwrap();
    }
}
