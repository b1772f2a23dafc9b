// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Gateway composition root.
//!
//! Outbound: command request → registry build → codec encode → session
//! send. Any failure along the way surfaces as a typed error and no bytes
//! leave the process. Inbound: wire frame → codec decode against the host
//! envelope → observer. A malformed inbound frame is logged and dropped;
//! the receive loop keeps running.

use crate::commands::HOST_ENVELOPE;
use crate::registry::{CommandRegistry, RegistryError};
use crate::request::CommandRequest;
use crate::session::{SessionError, TransportSession};
use iris_proto::{codec, CodecError, FieldTree, MessageHandle, SchemaCatalog, SchemaError, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Error type for gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Schema lookup failed (envelope types missing from the catalog).
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Command build failed (unknown kind or mapper rejection).
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Encode or decode failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The session refused the frame.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// One decoded inbound status message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// The decoded field tree (enums as symbols, defaults filled).
    pub fields: FieldTree,
    /// The same content rendered for display/logging.
    pub rendered: serde_json::Value,
}

/// Composition root wiring registry, codec, and session together.
#[derive(Debug)]
pub struct Gateway {
    catalog: Arc<SchemaCatalog>,
    registry: CommandRegistry,
    session: TransportSession,
    host_envelope: MessageHandle,
}

impl Gateway {
    /// Wire a gateway over a loaded catalog.
    ///
    /// The inbound envelope type is resolved here, eagerly: a catalog that
    /// has not finished loading (or a schema missing the envelope) fails
    /// construction, so no command can ever be submitted against an
    /// unresolved schema.
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        registry: CommandRegistry,
        session: TransportSession,
    ) -> Result<Self, GatewayError> {
        let host_envelope = catalog.message(HOST_ENVELOPE)?;
        Ok(Self {
            catalog,
            registry,
            session,
            host_envelope,
        })
    }

    /// The registry this gateway dispatches through.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The session this gateway transmits on.
    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    /// Take the single-subscriber inbound frame stream from the session.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.session.take_inbound()
    }

    /// Submit one command request: build, encode, send.
    ///
    /// No retries and no partial transmission — the first failure is
    /// returned and the frame (if any) is discarded.
    pub fn submit(&self, request: &CommandRequest) -> Result<(), GatewayError> {
        let spec = self.registry.spec(&request.command_type)?;
        let tree = spec.map(&request.params).map_err(RegistryError::from)?;
        let frame = codec::encode(&self.catalog, spec.target(), &tree)?;
        debug!(
            kind = %request.command_type,
            bytes = frame.len(),
            "command encoded"
        );
        self.session.send(frame)?;
        Ok(())
    }

    /// Decode one inbound frame against the host envelope.
    pub fn decode_status(&self, frame: &[u8]) -> Result<StatusReport, GatewayError> {
        let fields = codec::decode(&self.catalog, &self.host_envelope, frame)?;
        let rendered = render_json(&fields);
        Ok(StatusReport { fields, rendered })
    }

    /// Pump the inbound stream until the session ends, reporting each
    /// decoded frame to `observer`.
    ///
    /// A frame that fails to decode is reported in the log and dropped;
    /// decoding continues with the next frame.
    pub async fn run_inbound<F>(&self, mut inbound: mpsc::Receiver<Vec<u8>>, mut observer: F)
    where
        F: FnMut(StatusReport),
    {
        while let Some(frame) = inbound.recv().await {
            match self.decode_status(&frame) {
                Ok(report) => observer(report),
                Err(err) => warn!(error = %err, "dropping malformed inbound frame"),
            }
        }
    }
}

/// Render a field tree as JSON for display/logging.
pub fn render_json(tree: &FieldTree) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in tree.iter() {
        map.insert(name.to_string(), render_value(value));
    }
    serde_json::Value::Object(map)
}

fn render_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Text(s) | Value::Symbol(s) => serde_json::Value::String(s.clone()),
        Value::Tree(nested) => render_json(nested),
    }
}
