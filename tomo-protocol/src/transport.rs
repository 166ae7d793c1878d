//! Transport seam for outbound frames

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tomo_core::{Error, Result};

/// Duplex message channel; only the sending half is needed here
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one text frame
    async fn send(&self, frame: String) -> Result<()>;

    /// Serialize and send a JSON frame
    async fn send_json(&self, frame: &Value) -> Result<()> {
        self.send(frame.to_string()).await
    }
}

/// In-process transport that hands frames to a channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<String>,
}

impl ChannelTransport {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| Error::Transport("Outbound channel closed".to_string()))
    }
}
