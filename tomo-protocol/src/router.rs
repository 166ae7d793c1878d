//! Inbound frame classification
//!
//! `route` is total: every frame becomes either a typed message or a drop
//! decision carrying the reason, which is logged here.

use crate::message::{
    ActionMessage, ChatMessage, JsonMap, QueryRequest, QueryResponse, QueryResult, METHOD_ACTION,
    METHOD_MESSAGE, METHOD_QUERY,
};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// What to do with an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Action(ActionMessage),
    QueryRequest(QueryRequest),
    QueryResponse(QueryResponse),
    Chat(ChatMessage),
    Drop(DropReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    InvalidJson(String),
    Malformed { method: String, reason: String },
    UnknownMethod(String),
    Unclassified,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            DropReason::Malformed { method, reason } => {
                write!(f, "malformed {} message: {}", method, reason)
            }
            DropReason::UnknownMethod(method) => write!(f, "unknown method: {}", method),
            DropReason::Unclassified => f.write_str("frame has neither a method nor a result"),
        }
    }
}

/// Classifies inbound frames by method
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolRouter;

impl ProtocolRouter {
    pub fn new() -> Self {
        Self
    }

    /// Classify a text frame
    pub fn route(&self, frame: &str) -> RouteDecision {
        let decision = match serde_json::from_str::<Value>(frame) {
            Ok(value) => self.route_value(&value),
            Err(e) => RouteDecision::Drop(DropReason::InvalidJson(e.to_string())),
        };

        match &decision {
            RouteDecision::Drop(reason) => warn!("Dropping inbound frame: {}", reason),
            RouteDecision::Action(action) => {
                debug!("Routing action '{}' from {}", action.name, action.from)
            }
            RouteDecision::QueryRequest(query) => {
                debug!("Routing query {} ({}) from {}", query.id, query.query_type, query.from)
            }
            RouteDecision::QueryResponse(response) => {
                debug!("Routing response for query {}", response.id)
            }
            RouteDecision::Chat(chat) => debug!("Routing chat {} from {}", chat.id, chat.from),
        }
        decision
    }

    /// Classify an already parsed frame
    pub fn route_value(&self, value: &Value) -> RouteDecision {
        let message = unwrap_envelope(value);

        if let Some(method) = message.get("method") {
            let Some(method) = method.as_str() else {
                return RouteDecision::Drop(DropReason::UnknownMethod(method.to_string()));
            };
            let parsed = match method {
                METHOD_ACTION => parse_action(message).map(RouteDecision::Action),
                METHOD_QUERY => parse_query(message).map(RouteDecision::QueryRequest),
                METHOD_MESSAGE => parse_chat(message).map(RouteDecision::Chat),
                other => return RouteDecision::Drop(DropReason::UnknownMethod(other.to_string())),
            };
            return parsed.unwrap_or_else(|reason| {
                RouteDecision::Drop(DropReason::Malformed {
                    method: method.to_string(),
                    reason,
                })
            });
        }

        if message.get("result").is_some() {
            return parse_response(message)
                .map(RouteDecision::QueryResponse)
                .unwrap_or_else(|reason| {
                    RouteDecision::Drop(DropReason::Malformed {
                        method: "response".to_string(),
                        reason,
                    })
                });
        }

        RouteDecision::Drop(DropReason::Unclassified)
    }
}

/// Relay frames wrap the JSON-RPC message as `{ topic, body }`
fn unwrap_envelope(value: &Value) -> &Value {
    match (value.get("topic"), value.get("body"), value.get("method")) {
        (Some(Value::String(_)), Some(body @ Value::Object(_)), None) => body,
        _ => value,
    }
}

fn field_str<'a>(object: &'a Value, key: &str) -> Result<&'a str, String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("'{}' must be a string", key))
}

fn field_object<'a>(object: &'a Value, key: &str) -> Result<&'a JsonMap, String> {
    object
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| format!("'{}' must be an object", key))
}

fn parse_action(message: &Value) -> Result<ActionMessage, String> {
    let params = message
        .get("params")
        .filter(|p| p.is_object())
        .ok_or_else(|| "'params' must be an object".to_string())?;

    Ok(ActionMessage {
        name: field_str(params, "name")?.to_string(),
        from: field_str(params, "from")?.to_string(),
        params: field_object(params, "params")?.clone(),
    })
}

fn parse_query(message: &Value) -> Result<QueryRequest, String> {
    let id = field_str(message, "id")?;
    let params = message
        .get("params")
        .filter(|p| p.is_object())
        .ok_or_else(|| "'params' must be an object".to_string())?;

    let body = match params.get("body") {
        None | Some(Value::Null) => JsonMap::new(),
        Some(Value::Object(body)) => body.clone(),
        Some(_) => return Err("'body' must be an object".to_string()),
    };

    Ok(QueryRequest {
        id: id.to_string(),
        from: field_str(params, "from")?.to_string(),
        query_type: field_str(params, "type")?.to_string(),
        body,
    })
}

fn parse_chat(message: &Value) -> Result<ChatMessage, String> {
    let params = message
        .get("params")
        .cloned()
        .ok_or_else(|| "'params' is missing".to_string())?;
    serde_json::from_value(params).map_err(|e| e.to_string())
}

fn parse_response(message: &Value) -> Result<QueryResponse, String> {
    let id = field_str(message, "id")?;
    let result: QueryResult = message
        .get("result")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "'result' is missing".to_string())?;

    Ok(QueryResponse {
        id: id.to_string(),
        result,
    })
}
