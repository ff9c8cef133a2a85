//! Generic framed TCP request/response loop, shared by both the
//! coordinator and participant binaries. Each accepted connection is
//! expected to carry exactly one request and one response, matching
//! the "one connection per RPC call" client discipline of
//! [`super::client::RpcClient`] (SPEC_FULL §5).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bincode::config::Configuration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::error::{DbError, Result};

use super::{read_frame, write_frame};

const BINCODE_CONFIG: Configuration = bincode::config::standard();

/// Runs an accept loop on `addr`, decoding one `Req` and encoding one
/// `Resp` per connection via `handler`. Stops accepting once
/// `shutting_down` is observed true between accepts, then waits for
/// every in-flight connection it already spawned to finish handling
/// its one request/response before returning (SPEC_FULL §4.4: "waits
/// for any in-flight RPC threads to complete").
pub async fn serve<Req, Resp, F, Fut>(
    addr: &str,
    shutting_down: Arc<AtomicBool>,
    handler: F,
) -> Result<()>
where
    Req: bincode::Decode<()> + Send + 'static,
    Resp: bincode::Encode + Send + 'static,
    F: Fn(Req) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Resp> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| DbError::Network(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(%addr, "listening");

    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        if shutting_down.load(Ordering::SeqCst) {
            tracing::info!(%addr, "shutdown requested, leaving accept loop");
            break;
        }

        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        let handler = handler.clone();
        in_flight.spawn(async move {
            if let Err(e) = handle_connection(socket, handler).await {
                tracing::warn!(%peer, error = %e, "connection handling failed");
            }
        });
    }

    while in_flight.join_next().await.is_some() {}
    tracing::info!(%addr, "all in-flight connections drained");
    Ok(())
}

async fn handle_connection<Req, Resp, F, Fut>(mut socket: TcpStream, handler: F) -> Result<()>
where
    Req: bincode::Decode<()>,
    Resp: bincode::Encode,
    F: Fn(Req) -> Fut,
    Fut: Future<Output = Resp>,
{
    let bytes = read_frame(&mut socket).await?;
    let (request, _): (Req, usize) = bincode::decode_from_slice(&bytes, BINCODE_CONFIG)?;

    let response = handler(request).await;

    let encoded = bincode::encode_to_vec(&response, BINCODE_CONFIG)?;
    write_frame(&mut socket, &encoded).await?;
    Ok(())
}
