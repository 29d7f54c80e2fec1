//! Chat message pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  send(body)                                                     │
//! │  ├── Message { body, from: self, to: registry.peer_ids() }      │
//! │  ├── validate                                                   │
//! │  ├── "message" envelope -> every registered connection          │
//! │  └── MessageLog::append (no self-send over the transport)       │
//! │                                                                 │
//! │  receive(message)   (data event loop, "message" envelopes)      │
//! │  └── MessageLog::append (validates first)                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline functions operate on the node's `MeshState`; see
//! [`crate::mesh::MeshState::send_message`] and
//! [`crate::mesh::MeshState::receive_message`].

mod log;
mod message;

pub use log::MessageLog;
pub use message::Message;
