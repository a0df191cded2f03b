//! Client-side adapter over a tokio-tungstenite connection

use super::{BoxInbound, BoxSink, CloseInfo, Inbound, Outbound, TransportError};
use futures::{future, SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// Why opening a client connection failed
#[derive(Debug)]
pub enum ConnectFailure {
    Timeout,
    Transport(TransportError),
}

/// Open a WebSocket connection, giving up after `timeout`
pub async fn connect(url: &str, timeout: Duration) -> Result<(BoxSink, BoxInbound), ConnectFailure> {
    info!("Connecting to {}", url);

    let (ws, response) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| ConnectFailure::Timeout)?
        .map_err(|e| ConnectFailure::Transport(e.into()))?;

    debug!("WebSocket handshake complete (status {})", response.status());

    let (sink, stream) = ws.split();

    let sink = sink.with(|msg: Outbound| future::ready(Ok::<_, TransportError>(to_message(msg))));

    let stream = stream.filter_map(|msg| {
        future::ready(match msg {
            Ok(Message::Binary(data)) => Some(Ok(Inbound::Binary(data))),
            Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text))),
            Ok(Message::Close(frame)) => Some(Ok(Inbound::Closed(frame.map(|f| CloseInfo {
                code: u16::from(f.code),
                reason: f.reason.into_owned(),
            })))),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
            Err(e) => Some(Err(TransportError::from(e))),
        })
    });

    let sink: BoxSink = Box::pin(sink);
    Ok((sink, stream.boxed()))
}

fn to_message(msg: Outbound) -> Message {
    match msg {
        Outbound::Binary(data) => Message::Binary(data),
        Outbound::Text(text) => Message::Text(text),
        Outbound::Close(info) => Message::Close(Some(CloseFrame {
            code: CloseCode::from(info.code),
            reason: info.reason.into(),
        })),
    }
}
