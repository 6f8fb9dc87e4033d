//! WebSocket transport for the execution channel.
//!
//! [`WsOpener`] resolves the channel URL (which embeds a session token) and
//! dials it; [`WsChannel`] adapts the resulting stream to the frame-oriented
//! [`Channel`] the job driver works with.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::client::RportClient;
use crate::error::{Error, Result};
use crate::exec::{Channel, ChannelOpener};

/// Produces the URL of a WebSocket endpoint, including credentials.
#[async_trait]
pub trait WsUrlBuilder: Send + Sync {
    async fn build(&self) -> Result<String>;
}

#[async_trait]
impl WsUrlBuilder for String {
    async fn build(&self) -> Result<String> {
        Ok(self.clone())
    }
}

/// URL of an rport WebSocket endpoint, authenticated through the REST client.
pub struct ApiWsUrl {
    client: Arc<RportClient>,
    path: &'static str,
}

impl ApiWsUrl {
    pub fn new(client: Arc<RportClient>, path: &'static str) -> Self {
        Self { client, path }
    }
}

#[async_trait]
impl WsUrlBuilder for ApiWsUrl {
    async fn build(&self) -> Result<String> {
        self.client.ws_url(self.path).await
    }
}

/// Opens [`WsChannel`]s to the URL produced by `B`.
pub struct WsOpener<B> {
    url_builder: B,
}

impl<B: WsUrlBuilder> WsOpener<B> {
    pub fn new(url_builder: B) -> Self {
        Self { url_builder }
    }
}

#[async_trait]
impl<B: WsUrlBuilder> ChannelOpener for WsOpener<B> {
    async fn open(&self) -> Result<Box<dyn Channel>> {
        let url = self.url_builder.build().await?;
        // Keep the access token out of the logs
        debug!(
            "connecting to {}",
            url.split_once('?').map_or(url.as_str(), |(base, _)| base)
        );
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(Box::new(WsChannel { ws }))
    }
}

/// One WebSocket connection carrying text frames.
pub struct WsChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Channel for WsChannel {
    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        let text = String::from_utf8(frame.to_vec())
            .map_err(|e| Error::Protocol(format!("frame is not valid UTF-8: {e}")))?;
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(msg) = self.ws.next().await {
            match msg {
                Ok(Message::Text(text)) => return Ok(Some(text.as_bytes().to_vec())),
                Ok(Message::Binary(data)) => return Ok(Some(data.to_vec())),
                Ok(Message::Close(frame)) => {
                    debug!("server closed the connection: {frame:?}");
                    return Ok(None);
                }
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        match self.ws.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => {
                warn!("failed to close WebSocket connection: {e}");
                Err(e.into())
            }
        }
    }
}
