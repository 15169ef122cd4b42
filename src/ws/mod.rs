//! WebSocket proxy subsystem.
//!
//! # Components
//! - `events`: wire format and the pure forwarding policy
//! - `rooms`: room-name → member-set registry
//! - `session`: per-connection Connecting → Connected → Closed machine
//!   with the pending-event buffer
//! - `gateway`: transport plumbing tying client and backend together
//!
//! # Ordering Guarantees
//! - Per-connection forwarding preserves arrival order (one task owns
//!   the pairing); no cross-connection ordering is guaranteed
//! - Buffered pre-ready events replay in enqueue order exactly once

pub mod events;
pub mod gateway;
pub mod rooms;
pub mod session;

pub use events::{EventFrame, ForwardRule};
pub use gateway::WsGateway;
pub use rooms::{ConnId, RoomRegistry};
pub use session::{Session, SessionState};
