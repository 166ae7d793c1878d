//! Answers for `objects`, `user` and `speak` queries

use crate::coordinator::CoordinatorEvent;
use crate::scene::SceneFacts;
use crate::speech::SpeechSynthesizer;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tomo_core::{CompanionId, Result};
use tomo_protocol::message::JsonMap;
use tomo_protocol::{QueryAnswerer, QueryResult};
use tracing::warn;

pub struct SceneAnswerer {
    facts: SceneFacts,
    speakers: HashMap<CompanionId, u32>,
    speech: Arc<dyn SpeechSynthesizer>,
    events: mpsc::Sender<CoordinatorEvent>,
}

impl SceneAnswerer {
    pub fn new(
        facts: SceneFacts,
        speakers: HashMap<CompanionId, u32>,
        speech: Arc<dyn SpeechSynthesizer>,
        events: mpsc::Sender<CoordinatorEvent>,
    ) -> Self {
        Self {
            facts,
            speakers,
            speech,
            events,
        }
    }

    async fn speak(&self, from: &CompanionId, body: &JsonMap) -> Result<QueryResult> {
        let Some(message) = body.get("message").and_then(Value::as_str) else {
            return Ok(QueryResult::failure("message must be a string"));
        };
        let Some(&speaker_id) = self.speakers.get(from) else {
            return Ok(QueryResult::failure(format!("{} is not a registered companion", from)));
        };

        if let Some(emotion) = body.get("emotion").and_then(Value::as_str) {
            let event = CoordinatorEvent::SetExpression {
                companion: from.clone(),
                expression: emotion.to_string(),
            };
            if self.events.send(event).await.is_err() {
                warn!("Coordinator gone, dropping expression for {}", from);
            }
        }

        self.speech.speak(message, speaker_id).await?;
        Ok(QueryResult::ok(json!({ "success": true })))
    }
}

#[async_trait]
impl QueryAnswerer for SceneAnswerer {
    async fn answer(&self, query_type: &str, from: &CompanionId, body: &JsonMap) -> Result<QueryResult> {
        match query_type {
            "speak" => self.speak(from, body).await,
            "objects" => Ok(QueryResult::ok(json!({ "list": self.facts.furniture() }))),
            "user" => {
                let p = self.facts.user_position();
                Ok(QueryResult::ok(json!({ "x": p.x, "y": p.y, "z": p.z })))
            }
            _ => Ok(QueryResult::unknown_type()),
        }
    }
}
