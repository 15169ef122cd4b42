//! Per-connection session state machine.
//!
//! ```text
//! Connecting → Connected → Closed
//! ```
//!
//! While Connecting, client-originated events accumulate in the pending
//! buffer instead of being forwarded. When the backend connection opens,
//! the buffer is drained in enqueue order exactly once. The transport
//! plumbing lives in `gateway`; this type holds only the state.

use crate::ws::events::EventFrame;
use crate::ws::rooms::ConnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Closed,
}

/// State for one client connection and its backend pairing.
#[derive(Debug)]
pub struct Session {
    pub id: ConnId,
    state: SessionState,
    pending: Vec<EventFrame>,
}

impl Session {
    pub fn new(id: ConnId) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pass a client event through, or buffer it while the backend
    /// connection is not yet ready. Returns the frame to forward now.
    pub fn outbound(&mut self, frame: EventFrame) -> Option<EventFrame> {
        match self.state {
            SessionState::Connecting => {
                self.pending.push(frame);
                None
            }
            SessionState::Connected => Some(frame),
            SessionState::Closed => None,
        }
    }

    /// Mark the backend connection open and drain the pending buffer in
    /// enqueue order. The buffer is discarded after this call.
    pub fn backend_ready(&mut self) -> Vec<EventFrame> {
        self.state = SessionState::Connected;
        std::mem::take(&mut self.pending)
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.pending.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn frame(n: u32) -> EventFrame {
        EventFrame::new("send_message", json!({ "seq": n }))
    }

    #[test]
    fn test_events_buffer_while_connecting() {
        let mut session = Session::new(Uuid::new_v4());
        assert_eq!(session.state(), SessionState::Connecting);

        assert!(session.outbound(frame(1)).is_none());
        assert!(session.outbound(frame(2)).is_none());
        assert_eq!(session.pending_len(), 2);
    }

    #[test]
    fn test_backend_ready_drains_in_order_exactly_once() {
        let mut session = Session::new(Uuid::new_v4());
        session.outbound(frame(1));
        session.outbound(frame(2));
        session.outbound(frame(3));

        let drained = session.backend_ready();
        assert_eq!(drained, vec![frame(1), frame(2), frame(3)]);
        assert_eq!(session.pending_len(), 0);
        assert_eq!(session.state(), SessionState::Connected);

        // Second drain yields nothing
        assert!(session.backend_ready().is_empty());
    }

    #[test]
    fn test_events_pass_through_once_connected() {
        let mut session = Session::new(Uuid::new_v4());
        session.backend_ready();
        assert_eq!(session.outbound(frame(7)), Some(frame(7)));
        assert_eq!(session.pending_len(), 0);
    }

    #[test]
    fn test_closed_session_drops_everything() {
        let mut session = Session::new(Uuid::new_v4());
        session.outbound(frame(1));
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.pending_len(), 0);
        assert!(session.outbound(frame(2)).is_none());
    }
}
