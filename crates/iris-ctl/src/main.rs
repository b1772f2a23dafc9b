// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-line client for the iris device gateway.
//!
//! Loads the schema file, registers the standard command set, opens one
//! WebSocket session, and either submits a command or tails the decoded
//! host status stream.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use iris_gateway::{standard_set, ws, CommandRequest, Gateway, ParamBag};
use iris_proto::SchemaCatalog;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "iris device gateway CLI")]
struct Args {
    /// WebSocket endpoint of the device host
    #[arg(long, default_value = "ws://127.0.0.1:8085")]
    endpoint: String,
    /// Path to the device schema file
    #[arg(long, default_value = "proto/thermal.proto")]
    schema: PathBuf,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List the registered command kinds
    Kinds,
    /// Submit one command against the live session
    Send {
        /// Command kind (e.g. setZoom)
        kind: String,
        /// Parameters as a JSON object (e.g. '{"zoomLevel": "ZOOM_X2"}')
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Tail decoded host status messages as pretty JSON
    Listen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let schema_text = tokio::fs::read_to_string(&args.schema)
        .await
        .with_context(|| format!("read schema {}", args.schema.display()))?;
    let catalog = Arc::new(SchemaCatalog::parse(&schema_text).context("parse schema")?);
    let registry = standard_set(&catalog).context("register standard command set")?;

    match args.cmd {
        Cmd::Kinds => {
            for kind in registry.kinds() {
                println!("{kind}");
            }
            Ok(())
        }
        Cmd::Send { kind, params } => {
            let params: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&params).context("--params must be a JSON object")?;
            let gateway = connect(&args.endpoint, catalog, registry).await?;
            let request = CommandRequest {
                command_type: kind.clone(),
                params: ParamBag::from(params),
            };
            gateway.submit(&request).with_context(|| format!("submit {kind}"))?;
            info!(%kind, "command sent");
            gateway.session().close();
            Ok(())
        }
        Cmd::Listen => {
            let mut gateway = connect(&args.endpoint, catalog, registry).await?;
            let inbound = gateway
                .take_inbound()
                .context("inbound stream already taken")?;
            info!(endpoint = %args.endpoint, "listening for host status");
            tokio::select! {
                () = gateway.run_inbound(inbound, |report| {
                    match serde_json::to_string_pretty(&report.rendered) {
                        Ok(pretty) => println!("{pretty}"),
                        Err(_) => println!("{}", report.fields),
                    }
                }) => {}
                _ = tokio::signal::ctrl_c() => {
                    gateway.session().close();
                }
            }
            Ok(())
        }
    }
}

async fn connect(
    endpoint: &str,
    catalog: Arc<SchemaCatalog>,
    registry: iris_gateway::CommandRegistry,
) -> Result<Gateway> {
    let session = ws::open(endpoint);
    let opened = timeout(Duration::from_secs(5), session.wait_open())
        .await
        .with_context(|| format!("timed out connecting to {endpoint}"))?;
    if !opened {
        bail!("connection to {endpoint} failed");
    }
    Gateway::new(catalog, registry, session).context("wire gateway")
}
