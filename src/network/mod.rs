pub mod client;
pub mod protocol;
pub mod server;

pub use client::{ClientError, RpcClient};
pub use protocol::{CoordinatorRequest, CoordinatorResponse, ParticipantRequest, ParticipantResponse};
pub use server::serve;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{DbError, Result};

/// Maximum frame size accepted on either side of the wire (16MB),
/// matching the bound the teacher's protocol module placed on
/// bincode deserialization.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

pub(crate) async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(DbError::Network(format!(
            "frame of {len} bytes exceeds max of {MAX_FRAME_SIZE} bytes"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

pub(crate) async fn write_frame(stream: &mut TcpStream, bytes: &[u8]) -> Result<()> {
    let len = bytes.len() as u32;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}
