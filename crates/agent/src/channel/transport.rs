// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Concrete [`Transport`]/[`Dialer`] over a real WebSocket, grounded on the
//! teacher's `upstream::feed::spawn_event_feed` connect/split/reconnect
//! shape — here the split halves become the two sides of [`Transport`]
//! instead of being driven by an inline loop, so [`ChannelManager`] can stay
//! transport-agnostic.
//!
//! [`ChannelManager`]: crate::channel::ChannelManager

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{Dialer, Transport};
use crate::error::{CodedError, ErrorCode};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    sink: SplitSink<WsStream, WsMessage>,
    stream: SplitStream<WsStream>,
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, bytes: Bytes) -> Result<(), CodedError> {
        self.sink
            .send(WsMessage::Binary(bytes.to_vec().into()))
            .await
            .map_err(|e| CodedError::new(ErrorCode::TransportSendFailed, format!("websocket send failed: {e}")))
    }

    async fn recv(&mut self) -> Option<Result<Bytes, CodedError>> {
        loop {
            return match self.stream.next().await? {
                Ok(WsMessage::Binary(data)) => Some(Ok(Bytes::from(data.to_vec()))),
                Ok(WsMessage::Close(_)) => None,
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Text(_)) | Ok(WsMessage::Frame(_)) => {
                    continue;
                }
                Err(e) => Some(Err(CodedError::new(ErrorCode::TransportSendFailed, format!("websocket recv failed: {e}")))),
            };
        }
    }
}

/// Dials the control channel's WebSocket URL directly; the teacher rewrites
/// `http(s)://` to `ws(s)://` for an upstream base URL, but here the token
/// response already hands back a `wss://` URL (§4.8), so no rewrite is
/// needed.
#[derive(Debug, Default)]
pub struct WsDialer;

#[async_trait::async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, websocket_url: &str) -> Result<Box<dyn Transport>, CodedError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(websocket_url)
            .await
            .map_err(|e| CodedError::new(ErrorCode::TransportSendFailed, format!("websocket connect failed: {e}")))?;
        let (sink, stream) = ws_stream.split();
        Ok(Box::new(WsTransport { sink, stream }))
    }
}
