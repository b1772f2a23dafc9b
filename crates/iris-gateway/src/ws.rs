// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! WebSocket link adapter.
//!
//! Dials the configured endpoint in a background task and pumps binary
//! frames between the socket and a [`TransportSession`] pair. The adapter
//! owns no policy: a failed dial or a dropped socket simply closes the
//! session, and reconnecting (if wanted) is the caller's business.

use crate::session::{self, SessionDriver, TransportSession};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Frames queued per direction before sends start failing fast.
const QUEUE_FRAMES: usize = 64;

/// Open a session over one WebSocket connection.
///
/// Returns immediately with the session in `Connecting`; the state flips to
/// `Open` once the WS handshake completes, or to `Closed` if the dial
/// fails. Use [`TransportSession::wait_open`] to observe the outcome.
pub fn open(endpoint: impl Into<String>) -> TransportSession {
    let endpoint = endpoint.into();
    let (session, driver) = session::channel(QUEUE_FRAMES);
    tokio::spawn(run_link(endpoint, driver));
    session
}

async fn run_link(endpoint: String, driver: SessionDriver) {
    let (stream, _response) = match tokio_tungstenite::connect_async(endpoint.as_str()).await {
        Ok(ok) => ok,
        Err(err) => {
            warn!(%endpoint, error = %err, "websocket dial failed");
            driver.mark_closed();
            return;
        }
    };
    if !driver.mark_open() {
        // Closed while dialing; drop the socket again.
        debug!(%endpoint, "session closed during dial");
        return;
    }
    info!(%endpoint, "session open");

    let (mut sink, mut source) = stream.split();
    let (shared, in_tx, mut out_rx) = driver.into_parts();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(frame) => {
                    if let Err(err) = sink.send(Message::binary(frame)).await {
                        warn!(error = %err, "websocket send failed");
                        break;
                    }
                }
                // Session half dropped.
                None => break,
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Binary(data))) => {
                    if in_tx.send(data.to_vec()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if sink.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(%endpoint, "peer closed the connection");
                    break;
                }
                Some(Ok(other)) => {
                    debug!(kind = %message_kind(&other), "ignoring non-binary frame");
                }
                Some(Err(err)) => {
                    warn!(error = %err, "websocket receive failed");
                    break;
                }
            },
            () = shared.wait_closed() => {
                debug!(%endpoint, "session closed locally");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    shared.close();
}

fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}
