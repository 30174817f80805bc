//! Length-prefixed invocation framing
//!
//! The testkit's choice of payload codec, not the core's: whole
//! invocations travel as a big-endian `u32` length followed by bincode
//! bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use weft_core::{Invocation, WeftError, WeftResult};

const MAX_FRAME: u32 = 16 * 1024 * 1024;

/// Write one framed invocation
pub async fn write_frame<W>(writer: &mut W, invocation: &Invocation) -> WeftResult<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = bincode::serialize(invocation)
        .map_err(|err| WeftError::serialization(err.to_string()))?;
    let len = u32::try_from(bytes.len())
        .map_err(|_| WeftError::serialization("invocation frame too large"))?;
    writer.write_u32(len).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed invocation
pub async fn read_frame<R>(reader: &mut R) -> WeftResult<Invocation>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME {
        return Err(WeftError::serialization(format!(
            "invocation frame of {len} bytes exceeds the limit"
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).await?;
    bincode::deserialize(&bytes).map_err(|err| WeftError::serialization(err.to_string()))
}
