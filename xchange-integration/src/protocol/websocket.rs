//! WebSocket transport abstraction (spec §4.9, §6). The (c) collaborator from spec §1: an
//! injectable connection factory so the reconnecting client in [`crate::ws_client`] is testable
//! without opening real sockets.

use crate::error::SocketError;
use async_trait::async_trait;
use flate2::read::ZlibDecoder;
use std::fmt::Debug;
use std::io::Read;

/// A message received from (or to be sent to) a WebSocket peer, independent of the concrete
/// client library.
#[derive(Debug, Clone)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

#[async_trait]
pub trait WsConnection: Send + Debug {
    async fn send(&mut self, message: WsMessage) -> Result<(), SocketError>;

    /// Returns `None` when the stream has ended (peer closed, or the connection errored fatally).
    async fn recv(&mut self) -> Option<Result<WsMessage, SocketError>>;

    async fn close(&mut self) -> Result<(), SocketError>;
}

#[async_trait]
pub trait WsTransport: Send + Sync + Debug {
    async fn connect(&self, url: &str) -> Result<Box<dyn WsConnection>, SocketError>;
}

/// Production [`WsTransport`] backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteTransport;

#[async_trait]
impl WsTransport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn WsConnection>, SocketError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(SocketError::WebSocket)?;
        Ok(Box::new(TungsteniteConnection { stream }))
    }
}

#[derive(Debug)]
struct TungsteniteConnection {
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl WsConnection for TungsteniteConnection {
    async fn send(&mut self, message: WsMessage) -> Result<(), SocketError> {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;

        let msg = match message {
            WsMessage::Text(t) => Message::Text(t.into()),
            WsMessage::Binary(b) => Message::Binary(b.into()),
            WsMessage::Ping(p) => Message::Ping(p.into()),
            WsMessage::Pong(p) => Message::Pong(p.into()),
            WsMessage::Close => Message::Close(None),
        };

        self.stream.send(msg).await.map_err(SocketError::WebSocket)
    }

    async fn recv(&mut self) -> Option<Result<WsMessage, SocketError>> {
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        loop {
            return match self.stream.next().await {
                None => None,
                Some(Ok(Message::Text(t))) => Some(Ok(WsMessage::Text(t.to_string()))),
                Some(Ok(Message::Binary(b))) => Some(Ok(WsMessage::Binary(b.to_vec()))),
                Some(Ok(Message::Ping(p))) => Some(Ok(WsMessage::Ping(p.to_vec()))),
                Some(Ok(Message::Pong(p))) => Some(Ok(WsMessage::Pong(p.to_vec()))),
                Some(Ok(Message::Close(_))) => Some(Ok(WsMessage::Close)),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => Some(Err(SocketError::WebSocket(e))),
            };
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        use futures_util::SinkExt;
        self.stream
            .close(None)
            .await
            .map_err(SocketError::WebSocket)
    }
}

/// Decompresses a zlib sync-flush deflate frame (spec §4.9, §9: Bitrue WebSocket gzip frames).
pub fn inflate_sync_flush(compressed: &[u8]) -> Result<String, SocketError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| SocketError::Decompress(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn inflate_round_trips_zlib_payload() {
        let original = r#"{"channel":"market_btcusdt_depth_step0"}"#;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(inflate_sync_flush(&compressed).unwrap(), original);
    }
}
