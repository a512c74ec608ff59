//! WebSocket channel carrying whole JSON objects in each direction.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::{
    net::TcpStream,
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

pub type ChannelMessage = Map<String, Value>;

const INCOMING_CAPACITY: usize = 256;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Derives the WebSocket URL for `path` from an http(s) server URL.
pub fn channel_url(server_url: &str, path: &str) -> Result<String> {
    let server_url = server_url.trim_end_matches('/');
    let ws_url = if server_url.starts_with("https://") {
        server_url.replacen("https://", "wss://", 1)
    } else if server_url.starts_with("http://") {
        server_url.replacen("http://", "ws://", 1)
    } else if server_url.starts_with("ws://") || server_url.starts_with("wss://") {
        server_url.to_string()
    } else {
        return Err(anyhow!("server_url must start with http:// or https://"));
    };
    let url = url::Url::parse(&format!("{ws_url}{path}"))
        .with_context(|| format!("invalid channel url derived from {server_url}"))?;
    Ok(url.to_string())
}

#[derive(Clone)]
pub struct ChannelSender {
    sink: Arc<Mutex<WsSink>>,
}

impl ChannelSender {
    pub async fn send(&self, message: &ChannelMessage) -> Result<()> {
        let text = serde_json::to_string(message).context("failed to encode channel message")?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .context("websocket send failed")
    }
}

pub struct ChannelConnection {
    sender: ChannelSender,
    incoming: mpsc::Receiver<ChannelMessage>,
    reader: JoinHandle<()>,
}

impl ChannelConnection {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect websocket: {url}"))?;
        let (sink, mut ws_reader) = ws_stream.split();
        let (tx, incoming) = mpsc::channel(INCOMING_CAPACITY);

        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_reader.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!("channel: dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(err) => {
                        warn!("channel: websocket receive failed: {err}");
                        break;
                    }
                };
                match serde_json::from_str::<Value>(&text) {
                    Ok(Value::Object(message)) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => warn!("channel: dropping message that is not a JSON object"),
                    Err(err) => warn!("channel: dropping malformed message: {err}"),
                }
            }
            debug!("channel: reader finished");
        });

        info!(url, "channel: connected");
        Ok(Self {
            sender: ChannelSender {
                sink: Arc::new(Mutex::new(sink)),
            },
            incoming,
            reader,
        })
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    pub async fn send(&self, message: &ChannelMessage) -> Result<()> {
        self.sender.send(message).await
    }

    /// Next well-formed message; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        self.incoming.recv().await
    }

    pub async fn close(self) {
        let _ = self.sender.sink.lock().await.close().await;
        self.reader.abort();
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
