// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end wiring over the shipped device schema: registry → codec →
//! session, with a driver standing in for the host end of the link.

use iris_gateway::{
    render_json, session, standard_set, CommandRequest, Gateway, GatewayError, SessionState,
    CLIENT_ENVELOPE,
};
use iris_proto::{codec, FieldTree, SchemaCatalog, Value};
use serde_json::json;
use std::sync::Arc;

const SCHEMA: &str = include_str!("../../../proto/thermal.proto");

fn wired() -> (Gateway, session::SessionDriver, Arc<SchemaCatalog>) {
    let catalog = Arc::new(SchemaCatalog::parse(SCHEMA).expect("shipped schema parses"));
    let registry = standard_set(&catalog).expect("standard set registers");
    let (session, driver) = session::channel(16);
    let gateway = Gateway::new(catalog.clone(), registry, session).expect("envelopes resolve");
    (gateway, driver, catalog)
}

/// Decode what the host would receive and pull out one command branch.
fn decoded_branch(
    catalog: &SchemaCatalog,
    frame: &[u8],
    branch: &str,
) -> serde_json::Value {
    let payload = catalog.message(CLIENT_ENVELOPE).expect("envelope");
    let tree = codec::decode(catalog, &payload, frame).expect("host-side decode");
    render_json(&tree)["command"][branch].clone()
}

#[tokio::test]
async fn every_command_kind_round_trips() {
    let (gateway, mut driver, catalog) = wired();
    driver.mark_open();

    let requests = [
        CommandRequest::new("setZoom").with("zoomLevel", json!("ZOOM_X4")),
        CommandRequest::new("setPallette").with("scheme", json!("BLACK_HOT")),
        CommandRequest::new("setAirTemp").with("temperature", json!(-40)),
        CommandRequest::new("setDst").with("distance", json!(150.5)),
        CommandRequest::new("setAgc").with("agcMode", json!("AUTO_2")),
        CommandRequest::new("setWind")
            .with("direction", json!(270))
            .with("speed", json!(12)),
        CommandRequest::new("setZeroing")
            .with("x", json!(-600000))
            .with("y", json!(599999)),
        CommandRequest::new("setPowderTemp").with("temperature", json!(15)),
        CommandRequest::new("setAirHum").with("humidity", json!(45)),
        CommandRequest::new("setAirPress").with("pressure", json!(10132)),
        CommandRequest::new("setMagOffset").with("offset", json!(-12)),
        CommandRequest::new("buttonPress").with("button", json!("MENU_SHORT")),
        CommandRequest::new("cmdTrigger").with("cmd", json!("LRF_MEASUREMENT")),
        CommandRequest::new("getHostDevStatus"),
        CommandRequest::new("getHostProfile"),
    ];
    for request in &requests {
        gateway.submit(request).expect("submit succeeds while open");
    }

    // Sends preserve submit order; spot-check a few decoded branches.
    let zoom_frame = driver.next_outbound().await.expect("setZoom frame");
    assert_eq!(
        decoded_branch(&catalog, &zoom_frame, "setZoom")["zoomLevel"],
        json!("ZOOM_X4")
    );

    let pallette_frame = driver.next_outbound().await.expect("setPallette frame");
    assert_eq!(
        decoded_branch(&catalog, &pallette_frame, "setPallette")["scheme"],
        json!("BLACK_HOT")
    );

    let air_temp_frame = driver.next_outbound().await.expect("setAirTemp frame");
    assert_eq!(
        decoded_branch(&catalog, &air_temp_frame, "setAirTC")["temperature"],
        json!(-40)
    );

    let dst_frame = driver.next_outbound().await.expect("setDst frame");
    assert_eq!(
        decoded_branch(&catalog, &dst_frame, "setDst")["distance"],
        json!(150.5)
    );

    for _ in 0..10 {
        driver.next_outbound().await.expect("remaining frames");
    }
    let profile_frame = driver.next_outbound().await.expect("getHostProfile frame");
    assert_eq!(
        decoded_branch(&catalog, &profile_frame, "getHostProfile"),
        json!({})
    );
}

#[tokio::test]
async fn submit_against_a_dead_link_reports_not_open() {
    let (gateway, driver, _catalog) = wired();
    driver.mark_closed();

    let err = gateway
        .submit(&CommandRequest::new("getHostProfile"))
        .expect_err("closed session rejects");
    assert!(matches!(err, GatewayError::Session(_)));
}

#[tokio::test]
async fn host_status_stream_survives_a_corrupt_frame() {
    let (mut gateway, driver, catalog) = wired();
    driver.mark_open();

    let host = catalog.message("HostPayload").expect("host envelope");
    let status = |charge: i64| {
        codec::encode(
            &catalog,
            &host,
            &FieldTree::new().with(
                "devStatus",
                Value::Tree(FieldTree::new().with("charge", Value::Int(charge))),
            ),
        )
        .expect("encode status")
    };

    assert!(driver.push_inbound(status(90)).await);
    // Truncated mid-field: length-delimited devStatus claiming 16 bytes.
    assert!(driver.push_inbound(vec![0x0a, 0x10, 0x08]).await);
    assert!(driver.push_inbound(status(89)).await);
    assert_eq!(driver.state(), SessionState::Open);
    drop(driver);

    let inbound = gateway.take_inbound().expect("inbound stream");
    let mut charges = Vec::new();
    gateway
        .run_inbound(inbound, |report| {
            charges.push(report.rendered["devStatus"]["charge"].clone());
        })
        .await;

    assert_eq!(charges, [json!(90), json!(89)]);
}
