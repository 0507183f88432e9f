//! JSON-RPC 2.0 envelope types: request, response, notification, and the
//! single- or batch-message union produced by the codec.

use super::types::RequestId;
use serde::{Deserialize, Serialize};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    pub fn into_result(self) -> Result<serde_json::Value, JsonRpcErrorObject> {
        match (self.result, self.error) {
            (Some(r), _) => Ok(r),
            (None, Some(e)) => Err(e),
            (None, None) => Err(JsonRpcErrorObject {
                code: super::types::error_codes::INTERNAL_ERROR,
                message: "response carried neither result nor error".to_string(),
                data: None,
            }),
        }
    }
}

/// One element of an inbound JSON value: either a single envelope or a batch.
/// Distinguishing request/notification/response on a single element relies on
/// presence of `id`/`method`, handled by [`IncomingMessage::from_value`].
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Batch(Vec<IncomingMessage>),
}

impl IncomingMessage {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if let serde_json::Value::Array(items) = value {
            let parsed = items
                .into_iter()
                .map(IncomingMessage::from_value)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(IncomingMessage::Batch(parsed));
        }

        let has_id = value.get("id").is_some();
        let has_method = value.get("method").is_some();

        if has_method {
            if has_id {
                Ok(IncomingMessage::Request(serde_json::from_value(value)?))
            } else {
                Ok(IncomingMessage::Notification(serde_json::from_value(value)?))
            }
        } else {
            Ok(IncomingMessage::Response(serde_json::from_value(value)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distinguishes_request_from_notification_by_id_presence() {
        let req = IncomingMessage::from_value(json!({"jsonrpc":"2.0","id":1,"method":"ping"}))
            .unwrap();
        assert!(matches!(req, IncomingMessage::Request(_)));

        let notif = IncomingMessage::from_value(
            json!({"jsonrpc":"2.0","method":"notifications/initialized"}),
        )
        .unwrap();
        assert!(matches!(notif, IncomingMessage::Notification(_)));
    }

    #[test]
    fn array_parses_as_batch() {
        let batch = IncomingMessage::from_value(json!([
            {"jsonrpc":"2.0","id":1,"method":"ping"},
            {"jsonrpc":"2.0","method":"notifications/initialized"}
        ]))
        .unwrap();
        match batch {
            IncomingMessage::Batch(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn response_without_method_field_parses_as_response_variant() {
        let resp =
            IncomingMessage::from_value(json!({"jsonrpc":"2.0","id":1,"result":{}})).unwrap();
        assert!(matches!(resp, IncomingMessage::Response(_)));
    }
}
