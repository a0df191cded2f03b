//! Tagged binary wire format for server → client messages
//!
//! Every message starts with one tag byte that selects the layout of the rest:
//!
//! | tag    | layout after the tag                                                   |
//! |--------|------------------------------------------------------------------------|
//! | `0x01` | width u16, height u16, fps f32, jpeg_len u32, timestamp f64, JPEG bytes |
//! | `0x02` | sample_rate u32, channels u8, pcm_len u32, timestamp f64, PCM bytes     |
//! | `0x03` | nothing (end-of-speech marker)                                         |
//!
//! All multi-byte fields are big-endian. The client → server audio path carries
//! raw PCM with no envelope and never goes through this codec.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};
use thiserror::Error;

/// Tag of a rendered video frame
pub const TAG_VIDEO: u8 = 0x01;
/// Tag of a rendered audio chunk
pub const TAG_AUDIO: u8 = 0x02;
/// Tag of the end-of-speech marker
pub const TAG_END_OF_SPEECH: u8 = 0x03;

/// Video header length, tag included
pub const VIDEO_HEADER_LEN: usize = 21;
/// Audio header length, tag included
pub const AUDIO_HEADER_LEN: usize = 18;

/// Default encode limit; matches the server's inbound WebSocket limit
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// One rendered JPEG frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u16,
    pub height: u16,
    /// Server's measured frame rate at send time
    pub fps: f32,
    /// Unix epoch seconds
    pub timestamp: f64,
    pub jpeg: Vec<u8>,
}

/// One chunk of rendered PCM audio (s16le)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioOutChunk {
    pub sample_rate: u32,
    pub channels: u8,
    /// Unix epoch seconds
    pub timestamp: f64,
    pub pcm: Vec<u8>,
}

/// A decoded server → client binary message
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Video(VideoFrame),
    Audio(AudioOutChunk),
    EndOfSpeech,
}

impl DecodedMessage {
    pub fn tag(&self) -> u8 {
        match self {
            DecodedMessage::Video(_) => TAG_VIDEO,
            DecodedMessage::Audio(_) => TAG_AUDIO,
            DecodedMessage::EndOfSpeech => TAG_END_OF_SPEECH,
        }
    }
}

/// Decoding failures. All of them are non-fatal: the caller drops the
/// message and keeps the connection open.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty binary message")]
    Empty,
    #[error("truncated header for tag 0x{tag:02X}: need {expected} bytes, got {actual}")]
    TruncatedHeader {
        tag: u8,
        expected: usize,
        actual: usize,
    },
    #[error("truncated payload for tag 0x{tag:02X}: declared {declared} bytes, {available} available")]
    TruncatedPayload {
        tag: u8,
        declared: usize,
        available: usize,
    },
    #[error("unknown binary tag 0x{0:02X}")]
    UnknownTag(u8),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload of {0} bytes does not fit a u32 length field")]
    PayloadTooLarge(usize),
    #[error("encoded message of {size} bytes exceeds the {limit} byte message limit")]
    MessageTooLarge { size: usize, limit: usize },
    #[error("failed to write message: {0}")]
    Io(#[from] io::Error),
}

/// Encodes server → client messages, enforcing the transport's message size limit
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    max_message_size: usize,
}

impl FrameEncoder {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn encode_video(
        &self,
        width: u16,
        height: u16,
        fps: f32,
        timestamp: f64,
        jpeg: &[u8],
    ) -> Result<Vec<u8>, EncodeError> {
        let jpeg_len = self.check_len(VIDEO_HEADER_LEN, jpeg.len())?;

        let mut buf = Vec::with_capacity(VIDEO_HEADER_LEN + jpeg.len());
        buf.write_u8(TAG_VIDEO)?;
        buf.write_u16::<BigEndian>(width)?;
        buf.write_u16::<BigEndian>(height)?;
        buf.write_f32::<BigEndian>(fps)?;
        buf.write_u32::<BigEndian>(jpeg_len)?;
        buf.write_f64::<BigEndian>(timestamp)?;
        buf.extend_from_slice(jpeg);

        Ok(buf)
    }

    pub fn encode_audio(
        &self,
        sample_rate: u32,
        channels: u8,
        timestamp: f64,
        pcm: &[u8],
    ) -> Result<Vec<u8>, EncodeError> {
        let pcm_len = self.check_len(AUDIO_HEADER_LEN, pcm.len())?;

        let mut buf = Vec::with_capacity(AUDIO_HEADER_LEN + pcm.len());
        buf.write_u8(TAG_AUDIO)?;
        buf.write_u32::<BigEndian>(sample_rate)?;
        buf.write_u8(channels)?;
        buf.write_u32::<BigEndian>(pcm_len)?;
        buf.write_f64::<BigEndian>(timestamp)?;
        buf.extend_from_slice(pcm);

        Ok(buf)
    }

    pub fn encode_end_of_speech(&self) -> Vec<u8> {
        vec![TAG_END_OF_SPEECH]
    }

    fn check_len(&self, header_len: usize, payload_len: usize) -> Result<u32, EncodeError> {
        let len = u32::try_from(payload_len).map_err(|_| EncodeError::PayloadTooLarge(payload_len))?;
        let size = header_len + payload_len;
        if size > self.max_message_size {
            return Err(EncodeError::MessageTooLarge {
                size,
                limit: self.max_message_size,
            });
        }
        Ok(len)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

/// Decode one server → client binary message.
///
/// Bytes past the declared payload length are ignored.
pub fn decode(bytes: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let (&tag, _) = bytes.split_first().ok_or(DecodeError::Empty)?;

    match tag {
        TAG_VIDEO => decode_video(bytes).map(DecodedMessage::Video),
        TAG_AUDIO => decode_audio(bytes).map(DecodedMessage::Audio),
        TAG_END_OF_SPEECH => Ok(DecodedMessage::EndOfSpeech),
        other => Err(DecodeError::UnknownTag(other)),
    }
}

fn decode_video(bytes: &[u8]) -> Result<VideoFrame, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    cursor.set_position(1);

    let header = (|| -> io::Result<_> {
        let width = cursor.read_u16::<BigEndian>()?;
        let height = cursor.read_u16::<BigEndian>()?;
        let fps = cursor.read_f32::<BigEndian>()?;
        let jpeg_len = cursor.read_u32::<BigEndian>()?;
        let timestamp = cursor.read_f64::<BigEndian>()?;
        Ok((width, height, fps, jpeg_len, timestamp))
    })();
    let (width, height, fps, jpeg_len, timestamp) =
        header.map_err(|_| truncated_header(TAG_VIDEO, VIDEO_HEADER_LEN, bytes.len()))?;

    let jpeg = take_payload(TAG_VIDEO, &bytes[VIDEO_HEADER_LEN..], jpeg_len)?;

    Ok(VideoFrame {
        width,
        height,
        fps,
        timestamp,
        jpeg,
    })
}

fn decode_audio(bytes: &[u8]) -> Result<AudioOutChunk, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    cursor.set_position(1);

    let header = (|| -> io::Result<_> {
        let sample_rate = cursor.read_u32::<BigEndian>()?;
        let channels = cursor.read_u8()?;
        let pcm_len = cursor.read_u32::<BigEndian>()?;
        let timestamp = cursor.read_f64::<BigEndian>()?;
        Ok((sample_rate, channels, pcm_len, timestamp))
    })();
    let (sample_rate, channels, pcm_len, timestamp) =
        header.map_err(|_| truncated_header(TAG_AUDIO, AUDIO_HEADER_LEN, bytes.len()))?;

    let pcm = take_payload(TAG_AUDIO, &bytes[AUDIO_HEADER_LEN..], pcm_len)?;

    Ok(AudioOutChunk {
        sample_rate,
        channels,
        timestamp,
        pcm,
    })
}

fn truncated_header(tag: u8, expected: usize, actual: usize) -> DecodeError {
    DecodeError::TruncatedHeader {
        tag,
        expected,
        actual,
    }
}

fn take_payload(tag: u8, rest: &[u8], declared: u32) -> Result<Vec<u8>, DecodeError> {
    let declared = declared as usize;
    if declared > rest.len() {
        return Err(DecodeError::TruncatedPayload {
            tag,
            declared,
            available: rest.len(),
        });
    }
    Ok(rest[..declared].to_vec())
}
