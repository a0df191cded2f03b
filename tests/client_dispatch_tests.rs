// Integration tests for client-side receive and send paths
//
// The client runs over an in-memory transport so each test controls exactly
// which messages the "server" sends and can inspect what the client sent.

use anyhow::Result;
use avatar_stream::client::{ChannelHandler, ClientError, ClientEvent, ClientSession};
use avatar_stream::config::ClientConfig;
use avatar_stream::protocol::{ControlSignal, FrameEncoder};
use avatar_stream::transport::{BoxInbound, BoxSink, CloseInfo, Inbound, Outbound, TransportError};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

struct FakeServer {
    to_client: mpsc::UnboundedSender<Result<Inbound, TransportError>>,
    from_client: mpsc::UnboundedReceiver<Outbound>,
}

impl FakeServer {
    fn send(&self, message: Inbound) {
        self.to_client.unbounded_send(Ok(message)).unwrap();
    }

    /// Everything the client has sent so far
    fn drain(&mut self) -> Vec<Outbound> {
        let mut sent = Vec::new();
        while let Ok(Some(message)) = self.from_client.try_next() {
            sent.push(message);
        }
        sent
    }
}

fn transport() -> (BoxSink, BoxInbound, FakeServer) {
    let (to_client, client_rx) = mpsc::unbounded();
    let (client_tx, from_client) = mpsc::unbounded::<Outbound>();

    let sink: BoxSink = Box::pin(client_tx.sink_map_err(|_| TransportError::Closed));
    let stream: BoxInbound = client_rx.boxed();

    (
        sink,
        stream,
        FakeServer {
            to_client,
            from_client,
        },
    )
}

fn config(pacing: bool) -> ClientConfig {
    ClientConfig {
        pacing,
        read_timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_undecodable_message_does_not_break_dispatch() -> Result<()> {
    let (sink, stream, server) = transport();
    let (handler, mut events) = ChannelHandler::new();
    let mut session = ClientSession::from_transport(sink, stream, config(false), handler);
    let mut statuses = session.take_status_events().unwrap();

    let encoder = FrameEncoder::default();
    server.send(Inbound::Text(r#"{"type":"connected","message":"hi"}"#.to_string()));
    server.send(Inbound::Binary(encoder.encode_audio(16000, 1, 1.0, &[1, 1])?));
    server.send(Inbound::Binary(vec![0xFF, 0x00, 0x01]));
    server.send(Inbound::Binary(encoder.encode_audio(16000, 1, 2.0, &[2, 2])?));
    server.send(Inbound::Binary(encoder.encode_end_of_speech()));
    server.send(Inbound::Closed(Some(CloseInfo::normal())));

    let stats = session.join().await?;
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.audio_chunks_received, 2);
    assert_eq!(stats.end_of_speech_received, 1);

    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }
    assert_eq!(received.len(), 3);
    assert!(matches!(&received[0], ClientEvent::Audio(chunk) if chunk.pcm == vec![1, 1]));
    assert!(matches!(&received[1], ClientEvent::Audio(chunk) if chunk.pcm == vec![2, 2]));
    assert_eq!(received[2], ClientEvent::EndOfSpeech);

    let status = statuses.recv().await.unwrap();
    assert_eq!(status.kind, "connected");
    assert_eq!(status.message.as_deref(), Some("hi"));

    Ok(())
}

#[tokio::test]
async fn test_abnormal_close_is_reported() {
    let (sink, stream, server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = ClientSession::from_transport(sink, stream, config(false), handler);

    server.send(Inbound::Closed(Some(CloseInfo::internal_error("rendering failed"))));

    match session.join().await {
        Err(ClientError::ServerClosed { code, reason }) => {
            assert_eq!(code, 1011);
            assert_eq!(reason, "rendering failed");
        }
        other => panic!("expected ServerClosed, got {:?}", other),
    }
    assert!(session.is_closed());
    assert!(matches!(
        session.send_audio(&[0u8; 2]).await,
        Err(ClientError::Closed)
    ));
}

#[tokio::test]
async fn test_stream_ending_without_close_is_a_disconnect() {
    let (sink, stream, server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = ClientSession::from_transport(sink, stream, config(false), handler);

    drop(server);

    assert!(matches!(session.join().await, Err(ClientError::Disconnected)));
}

fn short_timeout() -> ClientConfig {
    ClientConfig {
        read_timeout_secs: 1,
        ..config(false)
    }
}

#[tokio::test]
async fn test_idle_session_outlives_read_timeout() -> Result<()> {
    let (sink, stream, server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = ClientSession::from_transport(sink, stream, short_timeout(), handler);

    server.send(Inbound::Text(r#"{"type":"connected"}"#.to_string()));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(!session.is_closed());
    session.send_audio(&[0u8; 320]).await?;

    session.close().await?;
    session.join().await?;

    Ok(())
}

#[tokio::test]
async fn test_silent_render_hits_read_timeout() -> Result<()> {
    let (sink, stream, _server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = ClientSession::from_transport(sink, stream, short_timeout(), handler);

    session.send_audio(&[0u8; 320]).await?;
    session.send_control(ControlSignal::End).await?;

    assert!(matches!(
        session.join().await,
        Err(ClientError::ReadTimeout(timeout)) if timeout == Duration::from_secs(1)
    ));
    assert!(session.is_closed());

    Ok(())
}

#[tokio::test]
async fn test_end_of_speech_disarms_read_timeout() -> Result<()> {
    let (sink, stream, server) = transport();
    let (handler, mut events) = ChannelHandler::new();
    let session = ClientSession::from_transport(sink, stream, short_timeout(), handler);

    session.stream(&[0u8; 3200]).await?;
    server.send(Inbound::Binary(FrameEncoder::default().encode_end_of_speech()));
    assert_eq!(events.recv().await, Some(ClientEvent::EndOfSpeech));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!session.is_closed());

    session.close().await?;
    session.join().await?;

    Ok(())
}

#[tokio::test]
async fn test_interrupt_disarms_read_timeout() -> Result<()> {
    let (sink, stream, _server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = ClientSession::from_transport(sink, stream, short_timeout(), handler);

    session.send_audio(&[0u8; 320]).await?;
    session.interrupt().await?;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!session.is_closed());

    session.close().await?;
    session.join().await?;

    Ok(())
}

#[tokio::test]
async fn test_stream_sends_chunks_then_end() -> Result<()> {
    let (sink, stream, mut server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = ClientSession::from_transport(sink, stream, config(false), handler);

    session.stream(&vec![0u8; 3200 * 2 + 100]).await?;

    let sent = server.drain();
    let sizes: Vec<usize> = sent
        .iter()
        .filter_map(|message| match message {
            Outbound::Binary(pcm) => Some(pcm.len()),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![3200, 3200, 100]);
    assert_eq!(sent.last(), Some(&Outbound::Text(ControlSignal::End.to_json()?)));
    assert_eq!(session.stats().audio_bytes_sent, 6500);

    session.close().await?;
    assert_eq!(server.drain(), vec![Outbound::Close(CloseInfo::normal())]);
    session.join().await?;

    Ok(())
}

#[tokio::test]
async fn test_interrupt_cancels_stream_in_progress() -> Result<()> {
    let (sink, stream, mut server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = Arc::new(ClientSession::from_transport(sink, stream, config(true), handler));

    let streaming = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.stream(&vec![0u8; 3200 * 20]).await })
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    session.interrupt().await?;
    streaming.await??;

    let sent = server.drain();
    let interrupt = Outbound::Text(ControlSignal::Interrupt.to_json()?);
    let end = Outbound::Text(ControlSignal::End.to_json()?);

    assert_eq!(sent.last(), Some(&interrupt));
    assert!(!sent.contains(&end));
    let chunks = sent.iter().filter(|m| matches!(m, Outbound::Binary(_))).count();
    assert!(chunks >= 1 && chunks < 20, "sent {} chunks", chunks);

    Ok(())
}

#[tokio::test]
async fn test_close_cancels_stream_in_progress() -> Result<()> {
    let (sink, stream, mut server) = transport();
    let (handler, _events) = ChannelHandler::new();
    let session = Arc::new(ClientSession::from_transport(sink, stream, config(true), handler));

    let streaming = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.stream(&vec![0u8; 3200 * 20]).await })
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    session.close().await?;

    // Well within one 100ms pacing interval
    let result = tokio::time::timeout(Duration::from_millis(100), streaming).await??;
    assert!(matches!(result, Err(ClientError::Closed)), "got {:?}", result);

    let sent = server.drain();
    assert_eq!(sent.last(), Some(&Outbound::Close(CloseInfo::normal())));
    assert!(!sent.contains(&Outbound::Text(ControlSignal::End.to_json()?)));
    let chunks = sent.iter().filter(|m| matches!(m, Outbound::Binary(_))).count();
    assert!(chunks >= 1 && chunks < 20, "sent {} chunks", chunks);

    // Nothing is sent after close
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(server.drain().is_empty());

    session.join().await?;

    Ok(())
}
