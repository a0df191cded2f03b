//! Wire protocol between the thin client and the avatar renderer
//!
//! - client → server binary: raw 16 kHz mono s16le PCM, no header
//! - client → server text: [`ControlSignal`] JSON
//! - server → client binary: tagged frames, see [`codec`]
//! - server → client text: free-form status JSON, see [`ServerStatus`]

pub mod codec;
pub mod control;

pub use codec::{
    decode, AudioOutChunk, DecodeError, DecodedMessage, EncodeError, FrameEncoder, VideoFrame,
};
pub use control::{
    AudioFormat, ControlParseError, ControlSignal, ServerStatus, StatusMessage, VideoFormat,
};
