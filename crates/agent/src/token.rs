// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Channel token acquisition for component H. "Credential/user management"
//! is out of scope, so this is a narrow collaborator: one HTTP round trip,
//! no OAuth/PKCE/device-code flow.

use crate::error::{CodedError, ErrorCode};

/// A token good for opening one control-channel WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelToken {
    pub token: String,
    pub websocket_url: String,
}

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<ChannelToken, CodedError>;
}

/// Fetches a channel token with a single POST to a configurable endpoint.
/// The response body is expected to be `{"token": "...", "websocketUrl": "..."}`.
pub struct HttpTokenProvider {
    client: reqwest::Client,
    endpoint: String,
    instance_id: String,
}

impl HttpTokenProvider {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into(), instance_id: instance_id.into() }
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(rename = "websocketUrl")]
    websocket_url: String,
}

#[async_trait::async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self) -> Result<ChannelToken, CodedError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "instanceId": self.instance_id }))
            .send()
            .await
            .map_err(|e| classify_fetch_error(&e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_fetch_error(&format!("token endpoint returned {status}: {text}")));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CodedError::new(ErrorCode::TransportSendFailed, format!("decode token response: {e}")))?;

        Ok(ChannelToken { token: body.token, websocket_url: body.websocket_url })
    }
}

/// §4.8 token-fetch error classification: an `AccessDenied` substring marks
/// the failure as access-denied (a distinct observable health signal); every
/// other failure is a generic transport failure.
fn classify_fetch_error(message: &str) -> CodedError {
    if message.contains("AccessDenied") {
        CodedError::new(ErrorCode::AccessDenied, message.to_string())
    } else {
        CodedError::new(ErrorCode::TransportSendFailed, message.to_string())
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
