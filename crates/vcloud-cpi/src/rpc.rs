//! Request/response protocol spoken on stdin/stdout
//!
//! A request is `{"method": ..., "arguments": [...]}`; the response is
//! `{"result": ..., "error": ..., "log": ...}` with exactly one of `result`
//! and `error` set.

use crate::cloud::{VCloud, implemented_operation};
use crate::error::CpiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub context: Option<Value>,
}

impl RpcRequest {
    /// Director that sent the request, when its context names one
    pub fn director_uuid(&self) -> Option<&str> {
        self.context.as_ref()?.get("director_uuid")?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub ok_to_retry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: Value,
    pub error: Option<RpcError>,
    pub log: String,
}

impl RpcResponse {
    pub fn success(result: Value) -> Self {
        Self {
            result,
            error: None,
            log: String::new(),
        }
    }

    pub fn failure(error: &CpiError) -> Self {
        Self {
            result: Value::Null,
            error: Some(RpcError {
                kind: error.kind().to_string(),
                message: error.to_string(),
                ok_to_retry: error.ok_to_retry(),
            }),
            log: String::new(),
        }
    }
}

/// Answer one raw request, loading settings only when the call needs them
pub async fn respond(input: &str, config: Option<&Path>) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_str(input) {
        Ok(request) => request,
        Err(e) => return RpcResponse::failure(&CpiError::InvalidRequest(e.to_string())),
    };

    if let Err(e) = implemented_operation(&request.method) {
        tracing::warn!("Rejected {}", request.method);
        return RpcResponse::failure(&e);
    }

    let cloud = match VCloud::from_config(config) {
        Ok(cloud) => cloud,
        Err(e) => return RpcResponse::failure(&e),
    };
    handle(&cloud, &request).await
}

/// Answer a parsed request with an existing facade
pub async fn handle(cloud: &VCloud, request: &RpcRequest) -> RpcResponse {
    tracing::info!(
        "{} requested by director {}",
        request.method,
        request.director_uuid().unwrap_or("unknown")
    );
    match cloud.dispatch(&request.method, &request.arguments).await {
        Ok(result) => RpcResponse::success(result),
        Err(e) => {
            tracing::error!("{} failed: {}", request.method, e);
            RpcResponse::failure(&e)
        }
    }
}
