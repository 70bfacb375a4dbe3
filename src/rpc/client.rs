//! Minimal RPC client.
//!
//! Calls are issued one at a time over a single connection. Used by the
//! integration tests and handy for poking a running service.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::rpc::protocol::{RpcRequest, RpcResponse, RpcStatus, MAX_FRAME_LENGTH};

/// Errors raised by [`RpcClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("connection closed by server")]
    Closed,

    #[error("response id {got} does not match request id {expected}")]
    Mismatch { expected: u64, got: u64 },

    #[error(transparent)]
    Status(#[from] RpcStatus),
}

pub struct RpcClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    next_id: u64,
}

impl RpcClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_LENGTH)
            .new_codec();
        Ok(Self {
            framed: Framed::new(stream, codec),
            next_id: 1,
        })
    }

    /// Call `method` with a raw JSON payload.
    pub async fn call(&mut self, method: &str, payload: Value) -> Result<Value, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = RpcRequest::new(id, method, payload);
        self.framed
            .send(Bytes::from(serde_json::to_vec(&request)?))
            .await?;

        let frame = self.framed.next().await.ok_or(ClientError::Closed)??;
        let response: RpcResponse = serde_json::from_slice(&frame)?;
        if response.id != id {
            return Err(ClientError::Mismatch {
                expected: id,
                got: response.id,
            });
        }
        Ok(response.into_result()?)
    }

    /// Call `method` with typed payload and result.
    pub async fn call_typed<Req, Resp>(&mut self, method: &str, payload: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let value = self.call(method, serde_json::to_value(payload)?).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send raw bytes as one frame and return the decoded reply.
    pub async fn send_raw(&mut self, frame: &[u8]) -> Result<RpcResponse, ClientError> {
        self.framed.send(Bytes::copy_from_slice(frame)).await?;
        let frame = self.framed.next().await.ok_or(ClientError::Closed)??;
        Ok(serde_json::from_slice(&frame)?)
    }
}
