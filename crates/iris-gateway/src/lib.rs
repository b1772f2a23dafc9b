// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command gateway for the iris device link.
//!
//! Wires loosely-typed command requests through a runtime-loaded schema
//! onto one persistent binary WebSocket session:
//!
//! * [`request`] — the `{commandType, ...params}` surface and typed getters
//! * [`registry`] — command kind → builder dispatch
//! * [`commands`] — the standard device command set
//! * [`session`] — the `Connecting → Open → Closed` transport session
//! * [`ws`] — WebSocket link adapter
//! * [`gateway`] — composition root: build → encode → send, decode → report

pub mod commands;
pub mod gateway;
pub mod registry;
pub mod request;
pub mod session;
pub mod ws;

pub use commands::{standard_set, StandardSetError, CLIENT_ENVELOPE, HOST_ENVELOPE};
pub use gateway::{render_json, Gateway, GatewayError, StatusReport};
pub use registry::{CommandRegistry, CommandSpec, RegistryError};
pub use request::{CommandRequest, MappingError, ParamBag};
pub use session::{SessionError, SessionState, TransportSession};
