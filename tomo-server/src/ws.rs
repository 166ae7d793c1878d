//! WebSocket connection to the message relay
//!
//! A single task owns the socket: it writes frames queued by any
//! [`ChannelTransport`] clone and forwards inbound text frames to a channel.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tomo_core::{Error, Result};
use tomo_protocol::{ChannelTransport, ProtocolConfig};
use tracing::{debug, error, info, warn};
use url::Url;

pub struct RelayConnection {
    /// Queue frames for sending
    pub transport: ChannelTransport,
    /// Text frames received from the relay
    pub inbound: mpsc::Receiver<String>,
    /// Socket task; finishes when either side closes
    pub task: JoinHandle<()>,
}

/// Connect to the relay configured in `config`
pub async fn connect(config: &ProtocolConfig) -> Result<RelayConnection> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| Error::Configuration(format!("Invalid relay URL {}: {}", config.endpoint, e)))?;

    info!("Connecting to relay {}", url);
    let (ws_stream, _) = tokio::time::timeout(
        Duration::from_secs(config.connect_timeout_secs),
        connect_async(url.as_str()),
    )
    .await
    .map_err(|_| Error::Transport(format!("Timed out connecting to {}", url)))?
    .map_err(|e| Error::Transport(format!("WebSocket connect failed: {}", e)))?;
    info!("Connected to relay");

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(config.outbound_buffer);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(config.outbound_buffer);
    let (mut write, mut read) = ws_stream.split();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = write.send(Message::Text(frame)).await {
                            error!("Failed to send frame: {}", e);
                            break;
                        }
                    }
                    None => {
                        debug!("All senders dropped, closing relay connection");
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(text).await.is_err() {
                            debug!("Inbound receiver dropped");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Relay closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Relay connection error: {}", e);
                        break;
                    }
                    None => {
                        info!("Relay stream ended");
                        break;
                    }
                },
            }
        }
    });

    Ok(RelayConnection {
        transport: ChannelTransport::from_sender(outbound_tx),
        inbound: inbound_rx,
        task,
    })
}
