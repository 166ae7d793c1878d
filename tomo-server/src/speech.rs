//! Speech collaborator seam

use async_trait::async_trait;
use tomo_core::Result;
use tracing::info;

/// Speaks a line in a given voice and returns once playback has finished
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, speaker_id: u32) -> Result<()>;
}

/// Writes lines to the log instead of synthesizing audio
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSpeech;

#[async_trait]
impl SpeechSynthesizer for LoggingSpeech {
    async fn speak(&self, text: &str, speaker_id: u32) -> Result<()> {
        info!("[voice {}] {}", speaker_id, text);
        Ok(())
    }
}
