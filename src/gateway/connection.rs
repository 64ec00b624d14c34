use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::fmt;

#[derive(Debug)]
pub enum TransportError {
    Closed,
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => f.write_str("connection closed"),
            TransportError::Io(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// Ping, pong or undecodable binary. Only proves the peer is alive.
    Control,
}

/// Read half of a client connection.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Next frame from the peer. `Ok(None)` once the peer has closed.
    async fn read_frame(&mut self) -> Result<Option<InboundFrame>, TransportError>;
}

#[async_trait]
pub trait FrameWriter: Send + 'static {
    async fn write_frame(&mut self, text: String) -> Result<(), TransportError>;

    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Send a close frame and shut the write half. Errors are swallowed: the
    /// connection is going away either way.
    async fn close(&mut self, code: u16, reason: &'static str);
}

pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

pub struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
    closed: bool,
}

pub fn split(socket: WebSocket) -> (WsReader, WsWriter) {
    let (sink, stream) = socket.split();
    (
        WsReader { stream },
        WsWriter {
            sink,
            closed: false,
        },
    )
}

#[async_trait]
impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(InboundFrame::Text(text.to_string()))),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Ok(Some(InboundFrame::Text(text))),
                Err(_) => Ok(Some(InboundFrame::Control)),
            },
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                Ok(Some(InboundFrame::Control))
            }
            Some(Ok(Message::Close(_))) | None => Ok(None),
            Some(Err(e)) => Err(TransportError::Io(e.to_string())),
        }
    }
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn write_frame(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &'static str) {
        if self.closed {
            return;
        }
        self.closed = true;
        let frame = CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        };
        let _ = self.sink.send(Message::Close(Some(frame))).await;
        let _ = self.sink.close().await;
    }
}
