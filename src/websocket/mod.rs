//! WebSocket Change Streaming
//!
//! Streams user change events to watching clients.
//!
//! ## Usage
//!
//! Clients connect to `/api/users/watch` (optionally `?subscriber_id=...`)
//! and receive one text frame per change:
//!
//! ```json
//! {"type": "change", "operation_type": "update", "id": "0b6f6a1e-..."}
//! ```
//!
//! A slow client misses events rather than slowing down writers; nothing
//! is replayed on reconnect.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8080/api/users/watch');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(msg.operation_type, msg.id);
//! };
//! ```

mod handler;
mod messages;

pub use handler::websocket_handler;
pub use messages::ServerMessage;
