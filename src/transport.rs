//! Transport seam between the connection manager and the physical socket.
//!
//! The connection manager only knows how to open a transport, send text
//! frames, read [`TransportEvent`]s, and close. The production
//! implementation ([`WsTransport`]) speaks WebSocket via tokio-tungstenite;
//! tests drive the same trait with an in-memory fake.

use crate::error::{AmoraLinkError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{
        frame::coding::CloseCode, frame::CloseFrame, Message,
    },
};
use url::Url;

type WebSocketStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

/// Maximum inbound text message size (1 MiB). Larger frames are dropped.
const MAX_FRAME_BYTES: usize = 1 << 20;

/// Normal-closure close code sent on intentional disconnect.
pub const CLOSE_CODE_NORMAL: u16 = 1000;

/// Raw events reported by a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete inbound text frame.
    Frame(String),
    /// The connection closed; `code` is the close code when one was
    /// received (1000 = normal closure).
    Closed { code: Option<u16> },
    /// A transport-level error. The connection is unusable afterwards.
    Error(String),
}

/// Factory for transport connections. One `open` call produces one
/// physical connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to the gateway URL. The caller applies the
    /// connection-establishment deadline around this call.
    async fn open(&self, url: &str) -> Result<Box<dyn TransportConn>>;
}

/// One live bidirectional connection.
#[async_trait]
pub trait TransportConn: Send {
    /// Send a text frame. An error means the frame was not delivered.
    async fn send(&mut self, frame: &str) -> Result<()>;

    /// Wait for the next inbound event. After returning `Closed` or
    /// `Error` the connection yields only `Closed`.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close with a code and reason. Best-effort.
    async fn close(&mut self, code: u16, reason: &str);
}

/// Build the gateway WebSocket URL from a configured base, attaching the
/// current access token as a query parameter.
///
/// Accepts `http(s)` or `ws(s)` bases; the scheme is rewritten to `ws(s)`
/// and the path set to `/ws`. The token is attached fresh on every attempt
/// so reconnects never reuse a stale token.
pub fn resolve_gateway_url(base_url: &str, token: &str) -> Result<String> {
    let base = Url::parse(base_url.trim()).map_err(|e| {
        AmoraLinkError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
    })?;

    if base.host_str().is_none() {
        return Err(AmoraLinkError::ConfigurationError(
            "base_url must include a host".to_string(),
        ));
    }
    if !base.username().is_empty() || base.password().is_some() {
        return Err(AmoraLinkError::ConfigurationError(
            "base_url must not include inline credentials".to_string(),
        ));
    }

    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(AmoraLinkError::ConfigurationError(format!(
                "Unsupported base_url scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };

    let mut url = base;
    url.set_scheme(scheme).map_err(|_| {
        AmoraLinkError::ConfigurationError("Failed to set gateway URL scheme".to_string())
    })?;
    url.set_fragment(None);
    url.set_path("/ws");
    url.query_pairs_mut().clear().append_pair("token", token);

    Ok(url.to_string())
}

/// Production transport over tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    /// Create the WebSocket transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn TransportConn>> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| AmoraLinkError::WebSocketError(format!("Connection failed: {}", e)))?;
        Ok(Box::new(WsConn { stream }))
    }
}

struct WsConn {
    stream: WebSocketStream,
}

#[async_trait]
impl TransportConn for WsConn {
    async fn send(&mut self, frame: &str) -> Result<()> {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| AmoraLinkError::WebSocketError(format!("Failed to send frame: {}", e)))
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > MAX_FRAME_BYTES {
                        log::warn!("[amora-link] Inbound frame too large ({} bytes), dropping", text.len());
                        continue;
                    }
                    return TransportEvent::Frame(text.to_string());
                },
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return TransportEvent::Frame(text),
                    Err(_) => {
                        log::warn!("[amora-link] Non-UTF8 binary frame, dropping");
                        continue;
                    },
                },
                Some(Ok(Message::Ping(payload))) => {
                    // Protocol-level liveness is answered here; the JSON
                    // heartbeat is handled above the transport.
                    let _ = self.stream.send(Message::Pong(payload)).await;
                },
                Some(Ok(Message::Pong(_))) => {},
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code));
                    return TransportEvent::Closed { code };
                },
                Some(Ok(Message::Frame(_))) => {},
                Some(Err(e)) => return TransportEvent::Error(e.to_string()),
                None => return TransportEvent::Closed { code: None },
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let _ = self.stream.close(Some(frame)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_http_base_to_ws_with_token() {
        let url = resolve_gateway_url("http://gateway.amora.app", "tok123").unwrap();
        assert_eq!(url, "ws://gateway.amora.app/ws?token=tok123");
    }

    #[test]
    fn resolves_https_base_to_wss() {
        let url = resolve_gateway_url("https://gateway.amora.app/ignored", "t").unwrap();
        assert_eq!(url, "wss://gateway.amora.app/ws?token=t");
    }

    #[test]
    fn keeps_ws_scheme_and_port() {
        let url = resolve_gateway_url("ws://localhost:8085", "t").unwrap();
        assert_eq!(url, "ws://localhost:8085/ws?token=t");
    }

    #[test]
    fn token_is_percent_encoded() {
        let url = resolve_gateway_url("ws://localhost", "a b&c").unwrap();
        assert!(url.ends_with("/ws?token=a+b%26c") || url.ends_with("/ws?token=a%20b%26c"));
    }

    #[test]
    fn rejects_bad_bases() {
        assert!(resolve_gateway_url("not a url", "t").is_err());
        assert!(resolve_gateway_url("ftp://gateway.amora.app", "t").is_err());
        assert!(resolve_gateway_url("ws://user:pass@gateway.amora.app", "t").is_err());
    }
}
