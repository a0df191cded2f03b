use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client → server control message, carried as a JSON text frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlSignal {
    /// No more audio for the current utterance
    End,
    /// Abandon the current utterance and discard buffered audio
    Interrupt,
}

/// Why a control text frame was rejected
#[derive(Debug)]
pub enum ControlParseError {
    /// Not JSON at all, or JSON without a string `type`
    Malformed(serde_json::Error),
    /// Well-formed JSON with a `type` this protocol does not know
    UnknownType(String),
}

impl ControlSignal {
    pub fn to_json(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }

    pub fn parse(text: &str) -> Result<Self, ControlParseError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(rename = "type")]
            kind: String,
        }

        let envelope: Envelope = serde_json::from_str(text).map_err(ControlParseError::Malformed)?;
        match envelope.kind.as_str() {
            "end" => Ok(ControlSignal::End),
            "interrupt" => Ok(ControlSignal::Interrupt),
            _ => Err(ControlParseError::UnknownType(envelope.kind)),
        }
    }
}

/// Audio format advertised in the welcome status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: String,
    pub chunk_ms: u32,
}

/// Video format advertised in the welcome status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub codec: String,
    pub fps: f32,
}

/// Server → client status text messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerStatus {
    /// Sent once, right after the connection is accepted
    Connected {
        message: String,
        session_id: String,
        audio_format: AudioFormat,
        video_format: VideoFormat,
    },
    /// Sent before the server closes the session on a fatal error
    Error { message: String },
}

/// A status/diagnostic text message as seen by the client.
///
/// The server may send any JSON object; only `type` and `message` are lifted
/// out, everything else stays in `details`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub kind: String,
    pub message: Option<String>,
    pub details: Map<String, Value>,
}

impl StatusMessage {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(mut details)) => {
                let kind = match details.remove("type") {
                    Some(Value::String(kind)) => kind,
                    _ => "unknown".to_string(),
                };
                let message = match details.remove("message") {
                    Some(Value::String(message)) => Some(message),
                    _ => None,
                };
                Self {
                    kind,
                    message,
                    details,
                }
            }
            _ => Self {
                kind: "text".to_string(),
                message: Some(text.to_string()),
                details: Map::new(),
            },
        }
    }
}
