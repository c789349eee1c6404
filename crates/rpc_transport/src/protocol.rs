//! Wire format.
//!
//! Every call is one text frame holding a JSON object
//! `{"method": "...", "params": {...}}`, answered by one text frame holding
//! either `{"status": "ok", "body": {...}}` or
//! `{"status": "err", "body": "message"}`.

use colyseus_core::{
    NotifySubscriberRequest, PublishRequest, RegisterInterestRequest, RpcError, SpawnRequest, SubscribeRequest,
    UpdateRequest,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Calls accepted by a locator endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum LocatorCall {
    Publish(PublishRequest),
    Subscribe(SubscribeRequest),
}

/// Calls accepted by a replication endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ReplicationCall {
    Spawn(SpawnRequest),
    Update(UpdateRequest),
    RegisterInterest(RegisterInterestRequest),
    NotifySubscriber(NotifySubscriberRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum RpcReply {
    Ok(serde_json::Value),
    Err(String),
}

impl RpcReply {
    pub fn from_result<T: Serialize>(result: Result<T, RpcError>) -> Self {
        match result.and_then(|body| serde_json::to_value(body).map_err(|e| RpcError::Codec(e.to_string()))) {
            Ok(body) => RpcReply::Ok(body),
            Err(e) => RpcReply::Err(e.to_string()),
        }
    }

    pub fn into_result<R: DeserializeOwned>(self) -> Result<R, RpcError> {
        match self {
            RpcReply::Ok(body) => serde_json::from_value(body).map_err(|e| RpcError::Codec(e.to_string())),
            RpcReply::Err(message) => Err(RpcError::Remote(message)),
        }
    }
}

/// Decodes a call, turning malformed input into an error reply.
pub fn decode_call<C: DeserializeOwned>(payload: &str) -> Result<C, RpcReply> {
    serde_json::from_str(payload).map_err(|e| RpcReply::Err(format!("Malformed call: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colyseus_core::{Guid, NodeId, SpawnResponse};

    #[test]
    fn test_call_wire_shape() {
        let call = ReplicationCall::RegisterInterest(RegisterInterestRequest {
            target_guids: vec![],
            requester: NodeId(3),
            is_renewal: true,
        });
        let json = serde_json::to_value(&call).expect("call should encode");
        assert_eq!(json["method"], "RegisterInterest");
        assert_eq!(json["params"]["requester"], 3);
        assert_eq!(json["params"]["is_renewal"], true);
    }

    #[test]
    fn test_reply_conversions() {
        let guid = Guid::new();
        let reply = RpcReply::from_result(Ok(SpawnResponse { guid }));
        let response: SpawnResponse = reply.into_result().expect("ok reply should decode");
        assert_eq!(response.guid, guid);

        let reply = RpcReply::from_result::<SpawnResponse>(Err(RpcError::Remote("boom".into())));
        let result: Result<SpawnResponse, _> = reply.into_result();
        assert!(matches!(result, Err(RpcError::Remote(message)) if message.contains("boom")));
    }

    #[test]
    fn test_malformed_call_becomes_error_reply() {
        let decoded = decode_call::<LocatorCall>(r#"{"method":"Teleport","params":{}}"#);
        assert!(matches!(decoded, Err(RpcReply::Err(_))));
    }
}
