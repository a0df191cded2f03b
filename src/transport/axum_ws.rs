//! Server-side adapter over an axum WebSocket

use super::{CloseInfo, Inbound, Outbound, TransportError};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{future, Sink, SinkExt, Stream, StreamExt};

/// Split an upgraded socket into the session's sink and stream halves.
///
/// Ping/pong frames never reach the session.
pub fn split(
    socket: WebSocket,
) -> (
    impl Sink<Outbound, Error = TransportError> + Send + Unpin,
    impl Stream<Item = Result<Inbound, TransportError>> + Send + Unpin,
) {
    let (sink, stream) = socket.split();

    let sink = sink.with(|msg: Outbound| future::ready(Ok::<_, TransportError>(to_message(msg))));

    let stream = stream.filter_map(|msg| {
        future::ready(match msg {
            Ok(Message::Binary(data)) => Some(Ok(Inbound::Binary(data))),
            Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text))),
            Ok(Message::Close(frame)) => Some(Ok(Inbound::Closed(frame.map(|f| CloseInfo {
                code: f.code,
                reason: f.reason.into_owned(),
            })))),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Err(e) => Some(Err(TransportError::from(e))),
        })
    });

    (sink, stream)
}

fn to_message(msg: Outbound) -> Message {
    match msg {
        Outbound::Binary(data) => Message::Binary(data),
        Outbound::Text(text) => Message::Text(text),
        Outbound::Close(info) => Message::Close(Some(CloseFrame {
            code: info.code,
            reason: info.reason.into(),
        })),
    }
}
