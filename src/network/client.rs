//! RPC client used by the coordinator to call participants (and by
//! a participant's inactivity monitor to call the coordinator).
//!
//! Per SPEC_FULL §5, every call opens a fresh TCP connection, sends
//! one request frame, waits for one response frame under a caller-
//! supplied timeout, and closes the connection. A timeout or
//! connection failure is surfaced as [`TransactionError::TransportTimeout`]
//! / [`TransactionError::TransportError`] so the caller can fold it
//! into its abort/rollback decision without inspecting the transport
//! layer directly.

use std::time::Duration;

use bincode::config::Configuration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{read_frame, write_frame};

const BINCODE_CONFIG: Configuration = bincode::config::standard();

/// Transport-level outcome of a single RPC call, deliberately free of
/// any transaction/account context — callers attach that context
/// (see `Coordinator::call_participant`) when folding a failure into
/// a `TransactionError`.
#[derive(Debug)]
pub enum ClientError {
    Timeout,
    Transport(String),
}

/// A client bound to one remote endpoint (`host:port`), reused across
/// calls; each call still opens its own connection.
#[derive(Debug, Clone)]
pub struct RpcClient {
    addr: String,
}

impl RpcClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends `request`, waits up to `call_timeout` for a response,
    /// and decodes it as `Resp`.
    pub async fn call<Req, Resp>(
        &self,
        request: &Req,
        call_timeout: Duration,
    ) -> Result<Resp, ClientError>
    where
        Req: bincode::Encode,
        Resp: bincode::Decode<()>,
    {
        match timeout(call_timeout, self.call_inner(request)).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(reason)) => Err(ClientError::Transport(reason)),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    async fn call_inner<Req, Resp>(&self, request: &Req) -> Result<Resp, String>
    where
        Req: bincode::Encode,
        Resp: bincode::Decode<()>,
    {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| format!("connect to {}: {e}", self.addr))?;

        let encoded =
            bincode::encode_to_vec(request, BINCODE_CONFIG).map_err(|e| e.to_string())?;
        write_frame(&mut stream, &encoded)
            .await
            .map_err(|e| e.to_string())?;

        let bytes = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
        let (response, _): (Resp, usize) =
            bincode::decode_from_slice(&bytes, BINCODE_CONFIG).map_err(|e| e.to_string())?;
        Ok(response)
    }
}
