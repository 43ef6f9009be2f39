//! WebSocket transport backed by `tokio-tungstenite`

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{Connector, EventSocket};
use crate::error::{ConsoleError, Result};

/// Connector that opens a WebSocket to a fixed URL
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
}

impl WebSocketConnector {
    /// Create a connector for the given `ws://` or `wss://` URL
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self { url }
    }

    /// Target URL
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    type Socket = WebSocketSocket;

    async fn connect(&self) -> Result<WebSocketSocket> {
        log::debug!("Connecting to {}", self.url);
        if self.url.scheme() == "wss" {
            install_crypto_provider();
        }
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ConsoleError::transport(format!("connect to {} failed: {e}", self.url)))?;
        log::debug!("WebSocket handshake completed ({})", response.status());
        Ok(WebSocketSocket { stream })
    }
}

/// Make ring the process-wide rustls provider unless one is already set
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

/// Open WebSocket connection
pub struct WebSocketSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl std::fmt::Debug for WebSocketSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSocket").finish_non_exhaustive()
    }
}

impl EventSocket for WebSocketSocket {
    async fn recv(&mut self) -> Result<Option<String>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => {
                    return String::from_utf8(bytes).map(Some).map_err(|e| {
                        ConsoleError::protocol(format!("Binary frame is not UTF-8: {e}"), None)
                    });
                }
                Ok(Message::Close(frame)) => {
                    log::debug!("WebSocket closed by peer: {frame:?}");
                    return Ok(None);
                }
                // tungstenite answers pings itself
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Err(ConsoleError::transport(format!("WebSocket read failed: {e}"))),
            }
        }
        Ok(None)
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| ConsoleError::transport(format!("WebSocket write failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ConsoleError::transport(format!("WebSocket close failed: {e}")))
    }
}
