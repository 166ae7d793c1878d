//! Answering inbound queries

use crate::message::{JsonMap, QueryRequest, QueryResponse, QueryResult};
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tomo_core::{CompanionId, Result};
use tracing::{debug, error, warn};

/// Collaborator that knows the answers. Unknown types should return
/// [`QueryResult::unknown_type`]; errors are reported back as failures.
#[async_trait]
pub trait QueryAnswerer: Send + Sync {
    async fn answer(&self, query_type: &str, from: &CompanionId, body: &JsonMap) -> Result<QueryResult>;
}

/// Runs the answerer for each request and sends the response back
#[derive(Clone)]
pub struct QueryResponder {
    answerer: Arc<dyn QueryAnswerer>,
    transport: Arc<dyn Transport>,
}

impl QueryResponder {
    pub fn new(answerer: Arc<dyn QueryAnswerer>, transport: Arc<dyn Transport>) -> Self {
        Self { answerer, transport }
    }

    /// Answer without blocking the caller; slow answers (speech) run in their own task
    pub fn spawn(&self, request: QueryRequest) -> JoinHandle<()> {
        let responder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = responder.respond(request).await {
                error!("Failed to send query response: {}", e);
            }
        })
    }

    /// Compute the result and send it as a response frame
    pub async fn respond(&self, request: QueryRequest) -> Result<()> {
        let from = CompanionId::from(request.from.as_str());
        debug!("Answering {} query {} from {}", request.query_type, request.id, from);

        let result = match self
            .answerer
            .answer(&request.query_type, &from, &request.body)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Query {} ({}) failed: {}", request.id, request.query_type, e);
                QueryResult::failure(e.to_string())
            }
        };

        let response = QueryResponse {
            id: request.id,
            result,
        };
        self.transport.send_json(&response.to_frame()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::{json, Value};
    use tomo_core::Error;

    struct FixedAnswerer;

    #[async_trait]
    impl QueryAnswerer for FixedAnswerer {
        async fn answer(&self, query_type: &str, _from: &CompanionId, _body: &JsonMap) -> Result<QueryResult> {
            match query_type {
                "user" => Ok(QueryResult::ok(json!({"x": 0.0, "y": 1.6, "z": 0.0}))),
                "broken" => Err(Error::Validation("message must be a string".to_string())),
                _ => Ok(QueryResult::unknown_type()),
            }
        }
    }

    fn request(query_type: &str) -> QueryRequest {
        QueryRequest {
            id: "q1".to_string(),
            from: "companion_aya".to_string(),
            query_type: query_type.to_string(),
            body: JsonMap::new(),
        }
    }

    async fn respond(query_type: &str) -> Value {
        let (transport, mut rx) = ChannelTransport::new(4);
        let responder = QueryResponder::new(Arc::new(FixedAnswerer), Arc::new(transport));
        responder.spawn(request(query_type)).await.unwrap();
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_answer_is_sent_as_response() {
        let frame = respond("user").await;
        assert_eq!(frame["topic"], "queries");
        assert_eq!(frame["body"]["id"], "q1");
        assert_eq!(frame["body"]["result"]["body"]["y"], 1.6);
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let frame = respond("weather").await;
        assert_eq!(frame["body"]["result"]["success"], false);
        assert_eq!(frame["body"]["result"]["body"]["error"], "Unknown query type");
    }

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let frame = respond("broken").await;
        assert_eq!(frame["body"]["result"]["success"], false);
        assert!(frame["body"]["result"]["error"]
            .as_str()
            .unwrap()
            .contains("message must be a string"));
    }
}
