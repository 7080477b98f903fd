//! Protocol and state core of the streaming chat widget.
//!
//! Inbound frames from the assistant service are decoded in [`frame`], merged
//! into the [`transcript`] by the [`reducer`], and carried over a WebSocket
//! owned by the [`connection`] manager.

pub mod connection;
pub mod frame;
pub mod reducer;
pub mod transcript;

pub use connection::{ConnectionError, ConnectionManager, ConnectionState, InboundFrames};
pub use frame::{unescape_newlines, FrameError, OutboundFrame, ServerEvent};
pub use reducer::{Applied, ChatReducer, FrameSink, SendOutcome};
pub use transcript::{Message, MessageState, Sender, ToolBuffer, Transcript};
