//! Thin client for the avatar renderer
//!
//! Streams PCM to the server in fixed-duration chunks, sends `end` and
//! `interrupt` control messages, and dispatches decoded frames to a
//! [`FrameHandler`] from a background receive task.

mod error;
mod handler;
mod session;

pub use error::ClientError;
pub use handler::{ChannelHandler, ClientEvent, FrameHandler};
pub use session::{ClientSession, ClientStats};
