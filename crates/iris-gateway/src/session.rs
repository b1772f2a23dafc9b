// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transport session state machine and channel plumbing.
//!
//! One logical bidirectional channel: `Connecting → Open → Closed`, with
//! `Connecting → Closed` reachable on handshake failure and `Closed`
//! terminal. No reconnection happens here — that policy belongs to whoever
//! owns the session.
//!
//! The session half is what the gateway holds; the [`SessionDriver`] half is
//! what a link adapter (see [`crate::ws`]) or a test drives: it receives the
//! session's outbound frames, feeds inbound frames, and flips the state as
//! the underlying connection progresses.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Dial in progress; sends are rejected.
    Connecting,
    /// Link established; sends are accepted.
    Open,
    /// Terminal. The session never leaves this state.
    Closed,
}

/// Error type for session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session is not in the `Open` state. Routine while disconnected —
    /// commands fire against the live session or not at all.
    #[error("session is not open (state: {0:?})")]
    NotOpen(SessionState),
    /// The bounded outbound queue is saturated.
    #[error("outbound queue full")]
    QueueFull,
}

const STATE_CONNECTING: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// State transitions are the only shared mutation in the system; everything
/// else flows through the channels.
#[derive(Debug)]
pub(crate) struct Shared {
    state: AtomicU8,
    changed: Notify,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_CONNECTING),
            changed: Notify::new(),
        }
    }

    pub(crate) fn load(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            STATE_CONNECTING => SessionState::Connecting,
            STATE_OPEN => SessionState::Open,
            _ => SessionState::Closed,
        }
    }

    /// `Connecting → Open`. False if the session closed first.
    fn open(&self) -> bool {
        let flipped = self
            .state
            .compare_exchange(
                STATE_CONNECTING,
                STATE_OPEN,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if flipped {
            self.changed.notify_waiters();
        }
        flipped
    }

    /// Any state → `Closed`. Idempotent.
    pub(crate) fn close(&self) {
        if self.state.swap(STATE_CLOSED, Ordering::AcqRel) != STATE_CLOSED {
            self.changed.notify_waiters();
        }
    }

    pub(crate) async fn wait_closed(&self) {
        loop {
            let notified = self.changed.notified();
            if self.load() == SessionState::Closed {
                return;
            }
            notified.await;
        }
    }
}

/// The session half: what command submitters hold.
#[derive(Debug)]
pub struct TransportSession {
    shared: Arc<Shared>,
    out_tx: mpsc::Sender<Vec<u8>>,
    inbound: Option<mpsc::Receiver<Vec<u8>>>,
}

impl TransportSession {
    /// Current state. The value observed here is the latest transition.
    pub fn state(&self) -> SessionState {
        self.shared.load()
    }

    /// Enqueue one frame for transmission.
    ///
    /// The `Open` precondition is decided synchronously from the current
    /// state; nothing is buffered for a session that is not live.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Open {
            return Err(SessionError::NotOpen(state));
        }
        match self.out_tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SessionError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Driver is gone; reflect that in the state.
                self.shared.close();
                Err(SessionError::NotOpen(SessionState::Closed))
            }
        }
    }

    /// Take the single-subscriber inbound frame stream. Frames arrive in
    /// the order the transport received them. Returns `None` after the
    /// first call.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.inbound.take()
    }

    /// Close the session. Idempotent; `Closed` is terminal.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Wait until the session leaves `Connecting`. True when it reached
    /// `Open`, false when it went straight to `Closed`.
    pub async fn wait_open(&self) -> bool {
        loop {
            let notified = self.shared.changed.notified();
            match self.state() {
                SessionState::Open => return true,
                SessionState::Closed => return false,
                SessionState::Connecting => notified.await,
            }
        }
    }
}

/// The adapter half: pumps frames and drives state transitions.
#[derive(Debug)]
pub struct SessionDriver {
    shared: Arc<Shared>,
    in_tx: mpsc::Sender<Vec<u8>>,
    out_rx: mpsc::Receiver<Vec<u8>>,
}

impl SessionDriver {
    /// Mark the link established (`Connecting → Open`). False if the
    /// session was closed while dialing.
    pub fn mark_open(&self) -> bool {
        self.shared.open()
    }

    /// Mark the link gone. Idempotent.
    pub fn mark_closed(&self) {
        self.shared.close();
    }

    /// Current state, as the session half sees it.
    pub fn state(&self) -> SessionState {
        self.shared.load()
    }

    /// Deliver one inbound frame, preserving arrival order. False when the
    /// subscriber dropped the receiver.
    pub async fn push_inbound(&self, frame: Vec<u8>) -> bool {
        self.in_tx.send(frame).await.is_ok()
    }

    /// Next outbound frame, or `None` when the session half was dropped.
    pub async fn next_outbound(&mut self) -> Option<Vec<u8>> {
        self.out_rx.recv().await
    }

    /// Resolve when the session reaches `Closed` (from either half).
    pub async fn wait_closed(&self) {
        self.shared.wait_closed().await;
    }

    /// Split into the pieces a select loop needs: shared close signal,
    /// inbound sender, outbound receiver.
    pub(crate) fn into_parts(
        self,
    ) -> (Arc<Shared>, mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
        (self.shared, self.in_tx, self.out_rx)
    }
}

/// Create a session/driver pair over bounded queues of `capacity` frames.
/// The session starts in `Connecting`.
pub fn channel(capacity: usize) -> (TransportSession, SessionDriver) {
    let shared = Arc::new(Shared::new());
    let (out_tx, out_rx) = mpsc::channel(capacity);
    let (in_tx, in_rx) = mpsc::channel(capacity);
    (
        TransportSession {
            shared: shared.clone(),
            out_tx,
            inbound: Some(in_rx),
        },
        SessionDriver {
            shared,
            in_tx,
            out_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_is_rejected_until_open() {
        let (session, driver) = channel(8);
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(
            session.send(vec![1]),
            Err(SessionError::NotOpen(SessionState::Connecting))
        );

        assert!(driver.mark_open());
        session.send(vec![1]).unwrap();
    }

    #[tokio::test]
    async fn sent_frames_reach_the_driver_in_order() {
        let (session, mut driver) = channel(8);
        driver.mark_open();
        session.send(vec![1]).unwrap();
        session.send(vec![2]).unwrap();
        session.send(vec![3]).unwrap();

        assert_eq!(driver.next_outbound().await, Some(vec![1]));
        assert_eq!(driver.next_outbound().await, Some(vec![2]));
        assert_eq!(driver.next_outbound().await, Some(vec![3]));
    }

    #[tokio::test]
    async fn closed_is_terminal() {
        let (session, driver) = channel(8);
        session.close();
        assert!(!driver.mark_open());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            session.send(vec![1]),
            Err(SessionError::NotOpen(SessionState::Closed))
        );
        // Idempotent from both halves.
        session.close();
        driver.mark_closed();
        assert_eq!(driver.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn no_bytes_reach_the_driver_from_a_rejected_send() {
        let (session, mut driver) = channel(8);
        let _ = session.send(vec![0xde, 0xad]);
        driver.mark_open();
        session.send(vec![1]).unwrap();
        // Only the accepted frame is observable.
        assert_eq!(driver.next_outbound().await, Some(vec![1]));
    }

    #[tokio::test]
    async fn saturated_queue_reports_queue_full() {
        let (session, driver) = channel(1);
        driver.mark_open();
        session.send(vec![1]).unwrap();
        assert_eq!(session.send(vec![2]), Err(SessionError::QueueFull));
    }

    #[tokio::test]
    async fn inbound_is_single_subscriber_and_ordered() {
        let (mut session, driver) = channel(8);
        driver.mark_open();
        assert!(driver.push_inbound(vec![1]).await);
        assert!(driver.push_inbound(vec![2]).await);

        let mut inbound = session.take_inbound().expect("first take");
        assert!(session.take_inbound().is_none());
        assert_eq!(inbound.recv().await, Some(vec![1]));
        assert_eq!(inbound.recv().await, Some(vec![2]));
    }

    #[tokio::test]
    async fn wait_open_resolves_on_transition() {
        let (session, driver) = channel(8);
        let waiter = tokio::spawn(async move { session.wait_open().await });
        tokio::task::yield_now().await;
        driver.mark_open();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn wait_open_resolves_false_on_handshake_failure() {
        let (session, driver) = channel(8);
        driver.mark_closed();
        assert!(!session.wait_open().await);
    }
}
