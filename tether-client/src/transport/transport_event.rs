use crate::error::TransportError;
use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;

/// What listeners registered with `TransportClient::subscribe` receive.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message(String),
    Closed,
    Error(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

pub type FrameSink = Pin<Box<dyn Sink<OutboundFrame, Error = TransportError> + Send>>;

/// Inbound text frames. The stream ends when the peer closes the socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Opens the raw duplex channel underneath a `TransportClient`.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}
