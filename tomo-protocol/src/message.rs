//! Wire envelopes
//!
//! Frames are JSON-RPC 2.0 style messages, usually wrapped in a relay
//! envelope `{ "topic": ..., "body": ... }`. Inbound bodies are loosely
//! typed; everything is converted into the typed structs here before it
//! reaches the companion layer.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tomo_core::{CompanionId, Error, Result};
use uuid::Uuid;

pub type JsonMap = Map<String, Value>;

pub const JSONRPC_VERSION: &str = "2.0";

pub const METHOD_ACTION: &str = "action.send";
pub const METHOD_QUERY: &str = "query.send";
pub const METHOD_MESSAGE: &str = "message.send";

pub const TOPIC_ACTIONS: &str = "actions";
pub const TOPIC_QUERIES: &str = "queries";
pub const TOPIC_MESSAGES: &str = "messages";

/// Sender id used for chat typed by the user
pub const USER_SENDER: &str = "user";

fn envelope(topic: &str, body: Value) -> Value {
    json!({ "topic": topic, "body": body })
}

/// Fire-and-forget command addressed to a companion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub name: String,
    pub from: String,
    #[serde(default)]
    pub params: JsonMap,
}

impl ActionMessage {
    pub fn to_frame(&self) -> Value {
        envelope(
            TOPIC_ACTIONS,
            json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": METHOD_ACTION,
                "params": {
                    "name": self.name,
                    "from": self.from,
                    "params": self.params,
                },
            }),
        )
    }
}

/// Validated action, ready for the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ActionCommand {
    Walk { target: Vec3 },
    Run { target: Vec3 },
    Gesture { name: String },
}

impl ActionCommand {
    /// Check an action's parameters against its name
    pub fn parse(action: &ActionMessage) -> Result<Self> {
        match action.name.as_str() {
            "walk" => Ok(ActionCommand::Walk {
                target: coordinates(&action.params)?,
            }),
            "run" => Ok(ActionCommand::Run {
                target: coordinates(&action.params)?,
            }),
            "gesture" => {
                let name = action
                    .params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::Validation("gesture requires a string 'name'".to_string())
                    })?;
                Ok(ActionCommand::Gesture {
                    name: name.to_string(),
                })
            }
            other => Err(Error::Validation(format!("Unknown action: {}", other))),
        }
    }
}

fn coordinates(params: &JsonMap) -> Result<Vec3> {
    let axis = |key: &str| {
        params
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .map(|v| v as f32)
            .ok_or_else(|| Error::Validation(format!("'{}' must be a number", key)))
    };
    Ok(Vec3::new(axis("x")?, axis("y")?, axis("z")?))
}

/// Inbound request this side must answer
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub id: String,
    pub from: String,
    pub query_type: String,
    pub body: JsonMap,
}

/// Query this side sends and waits on
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundQuery {
    pub from: CompanionId,
    pub query_type: String,
    pub body: JsonMap,
}

impl OutboundQuery {
    pub fn new(from: CompanionId, query_type: impl Into<String>) -> Self {
        Self {
            from,
            query_type: query_type.into(),
            body: JsonMap::new(),
        }
    }

    /// Furniture labels and positions
    pub fn objects(from: CompanionId) -> Self {
        Self::new(from, "objects")
    }

    /// Where the user is standing
    pub fn user(from: CompanionId) -> Self {
        Self::new(from, "user")
    }

    /// Speak a line, optionally with an emotion applied as an expression
    pub fn speak(from: CompanionId, message: &str, emotion: Option<&str>) -> Self {
        let mut query = Self::new(from, "speak");
        query
            .body
            .insert("message".to_string(), Value::String(message.to_string()));
        if let Some(emotion) = emotion {
            query
                .body
                .insert("emotion".to_string(), Value::String(emotion.to_string()));
        }
        query
    }

    pub fn to_frame(&self, id: &str) -> Value {
        envelope(
            TOPIC_QUERIES,
            json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "method": METHOD_QUERY,
                "params": {
                    "from": self.from.as_str(),
                    "type": self.query_type,
                    "body": self.body,
                },
            }),
        )
    }
}

/// Outcome of a query, as carried in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn ok(body: Value) -> Self {
        Self {
            success: true,
            body: Some(body),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            body: None,
            error: Some(error.into()),
        }
    }

    pub fn unknown_type() -> Self {
        Self {
            success: false,
            body: Some(json!({ "error": "Unknown query type" })),
            error: None,
        }
    }
}

/// Response correlated to a query by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub id: String,
    pub result: QueryResult,
}

impl QueryResponse {
    pub fn to_frame(&self) -> Value {
        envelope(
            TOPIC_QUERIES,
            json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": self.id,
                "result": self.result,
            }),
        )
    }
}

/// Chat line broadcast to companions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub from: String,
    pub to: Vec<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ChatMessage {
    /// Chat from the user to the given companions
    pub fn from_user<'a>(to: impl IntoIterator<Item = &'a CompanionId>, message: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: USER_SENDER.to_string(),
            to: to.into_iter().map(|id| id.to_string()).collect(),
            message: message.to_string(),
            metadata: None,
        }
    }

    pub fn to_frame(&self) -> Value {
        envelope(
            TOPIC_MESSAGES,
            json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": METHOD_MESSAGE,
                "params": self,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(name: &str, params: Value) -> ActionMessage {
        ActionMessage {
            name: name.to_string(),
            from: "companion_natsumi".to_string(),
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_parse_walk() {
        let cmd = ActionCommand::parse(&action("walk", json!({"x": 1, "y": 0.0, "z": -2.5}))).unwrap();
        assert_eq!(
            cmd,
            ActionCommand::Walk {
                target: Vec3::new(1.0, 0.0, -2.5)
            }
        );
    }

    #[test]
    fn test_parse_rejects_string_coordinate() {
        let result = ActionCommand::parse(&action("run", json!({"x": "1", "y": 0, "z": 0})));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_rejects_missing_gesture_name() {
        let result = ActionCommand::parse(&action("gesture", json!({"gesture": "wave"})));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_action() {
        let result = ActionCommand::parse(&action("fly", json!({})));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_response_frame_shape() {
        let response = QueryResponse {
            id: "q1".to_string(),
            result: QueryResult::unknown_type(),
        };
        let frame = response.to_frame();
        assert_eq!(frame["topic"], "queries");
        assert_eq!(frame["body"]["jsonrpc"], "2.0");
        assert_eq!(frame["body"]["result"]["success"], false);
        assert_eq!(frame["body"]["result"]["body"]["error"], "Unknown query type");
        assert!(frame["body"]["result"].get("error").is_none());
    }

    #[test]
    fn test_chat_frame_shape() {
        let ids = [CompanionId::from_name("aya"), CompanionId::from_name("kyoko")];
        let chat = ChatMessage::from_user(ids.iter(), "hello");
        let frame = chat.to_frame();
        assert_eq!(frame["topic"], "messages");
        assert_eq!(frame["body"]["method"], "message.send");
        assert_eq!(frame["body"]["params"]["from"], "user");
        assert_eq!(frame["body"]["params"]["to"][1], "companion_kyoko");
    }

    #[test]
    fn test_speak_query_body() {
        let query = OutboundQuery::speak(CompanionId::from_name("aya"), "hi", Some("happy"));
        let frame = query.to_frame("abc");
        assert_eq!(frame["body"]["params"]["type"], "speak");
        assert_eq!(frame["body"]["params"]["body"]["emotion"], "happy");
        assert_eq!(frame["body"]["id"], "abc");
    }
}
