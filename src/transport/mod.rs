//! Duplex message transport underneath the sessions
//!
//! Sessions see a transport as a `Sink<Outbound>` plus a
//! `Stream<Item = Result<Inbound, TransportError>>`. The protocol has no
//! sequence numbers and no acknowledgements, so any transport plugged in here
//! must deliver messages reliably and in send order, like a single WebSocket
//! connection does.

pub mod axum_ws;
pub mod tungstenite_ws;

use futures::stream::BoxStream;
use futures::Sink;
use std::pin::Pin;
use thiserror::Error;

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// The server hit an internal (rendering) error
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn normal() -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason: String::new(),
        }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_INTERNAL_ERROR,
            reason: reason.into(),
        }
    }

    pub fn is_normal(&self) -> bool {
        self.code == CLOSE_NORMAL
    }
}

/// A message received from the peer
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Binary(Vec<u8>),
    Text(String),
    Closed(Option<CloseInfo>),
}

/// A message to send to the peer
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Binary(Vec<u8>),
    Text(String),
    Close(CloseInfo),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    Axum(#[from] axum::Error),
    #[error("websocket error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("transport closed")]
    Closed,
}

pub type BoxSink = Pin<Box<dyn Sink<Outbound, Error = TransportError> + Send>>;
pub type BoxInbound = BoxStream<'static, Result<Inbound, TransportError>>;
