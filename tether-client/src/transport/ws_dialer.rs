use crate::error::TransportError;
use crate::transport::{Dialer, FrameSink, FrameStream, OutboundFrame};
use async_trait::async_trait;
use futures::future::ready;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws_stream, response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_owned(),
                    reason: e.to_string(),
                })?;
        debug!("WebSocket handshake with {} done: {}", url, response.status());

        let (sender, receiver) = ws_stream.split();

        let sink = sender
            .sink_map_err(|e| TransportError::Socket(e.to_string()))
            .with(|frame: OutboundFrame| {
                ready(Ok::<_, TransportError>(match frame {
                    OutboundFrame::Text(text) => Message::Text(text.into()),
                    OutboundFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    })),
                }))
            });

        let stream = receiver
            .take_while(|msg| ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::Socket(e.to_string()))),
                })
            });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
