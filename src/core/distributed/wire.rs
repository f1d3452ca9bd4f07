//! Wire framing for the agent protocol: a 4-byte big-endian length prefix
//! followed by a `bincode`-serialized payload. One frame per request, one
//! frame per response; the agent serves one connection at a time.

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::clue::Clue;
use crate::core::scan::ScanTask;
use crate::error::{HalberdError, Result};

/// Cap on a single frame's declared length, guarding against a peer
/// claiming an absurd size and exhausting memory before we even try to
/// decode it.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// What an agent receives: the scan to run. Distributed fan-out is always
/// cleared on arrival (see [`ScanTask::as_local`]).
pub type AgentRequest = ScanTask;

/// What an agent sends back: its own UTC second at the moment of sending,
/// paired with the clues its local scan collected.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentResponse {
    pub agent_send_utc: i64,
    pub clues: Vec<Clue>,
    pub replies: u64,
    pub missed: u64,
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(value)
        .map_err(|e| HalberdError::AgentProtocol(format!("encode: {e}")))?;
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| HalberdError::AgentProtocol("frame too large to encode".to_string()))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(HalberdError::AgentProtocol(format!(
            "frame of {len} bytes exceeds {MAX_FRAME_BYTES}"
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload).map_err(|e| HalberdError::AgentProtocol(format!("decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_request_and_response() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let task = ScanTask::new(
            "http://x/",
            "127.0.0.1".parse().unwrap(),
            std::time::Duration::from_secs(1),
            1,
        );
        write_frame(&mut client, &task).await.unwrap();
        let received: AgentRequest = read_frame(&mut server).await.unwrap();
        assert_eq!(received.url, task.url);

        let response = AgentResponse {
            agent_send_utc: 12345,
            clues: Vec::new(),
            replies: 0,
            missed: 0,
        };
        write_frame(&mut server, &response).await.unwrap();
        let received: AgentResponse = read_frame(&mut client).await.unwrap();
        assert_eq!(received.agent_send_utc, 12345);
    }

    #[tokio::test]
    async fn rejects_oversized_frame_length() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client
            .write_all(&(MAX_FRAME_BYTES + 1).to_be_bytes())
            .await
            .unwrap();
        let result: Result<AgentResponse> = read_frame(&mut server).await;
        assert!(result.is_err());
    }
}
