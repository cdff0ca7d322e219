use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Default maximum frame size: 4MB (configurable via max_message_size)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Read one text frame from the stream
/// Format: [4 bytes length, big-endian][UTF-8 JSON bytes]
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    // A clean EOF before the length prefix means the peer went away
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    };

    if len > max_size {
        return Err(ProtocolError::MessageTooLarge(len, max_size));
    }

    if len == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await?;

    String::from_utf8(buffer).map_err(|_| ProtocolError::InvalidEncoding)
}

/// Write one text frame to the stream and flush it
/// Format: [4 bytes length, big-endian][UTF-8 JSON bytes]
pub async fn write_frame<W>(writer: &mut W, frame: &str, max_size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let data = frame.as_bytes();

    if data.len() > max_size {
        return Err(ProtocolError::MessageTooLarge(data.len(), max_size));
    }

    writer.write_u32(data.len() as u32).await?;
    writer.write_all(data).await?;

    // One frame per tick, so flush immediately
    writer.flush().await?;

    Ok(())
}

/// Read a frame and decode it as JSON
pub async fn read_message<R, T>(reader: &mut R, max_size: usize) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let frame = read_frame(reader, max_size).await?;
    serde_json::from_str(&frame).map_err(Into::into)
}

/// Encode a message as JSON and write it as one frame
pub async fn write_message<W, T>(writer: &mut W, message: &T, max_size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = serde_json::to_string(message)?;
    write_frame(writer, &frame, max_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityId, InboundMessage, OutboundBatch, OutboundOperation};

    #[tokio::test]
    async fn test_frames_cross_a_duplex_pipe() {
        let (mut scene, mut host) = tokio::io::duplex(1024);

        let batch = OutboundBatch::new(
            1,
            vec![OutboundOperation::CreateEntity { entity_id: EntityId(1) }],
        );
        write_message(&mut scene, &batch, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap();

        let received: OutboundBatch = read_message(&mut host, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(received, batch);

        let reply = InboundMessage::event("click", Some(EntityId(1)), serde_json::Value::Null);
        write_message(&mut host, &reply, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap();
        let frame = read_frame(&mut scene, DEFAULT_MAX_MESSAGE_SIZE).await.unwrap();
        assert_eq!(InboundMessage::from_json(&frame).unwrap(), reply);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected_on_write() {
        let (mut a, _b) = tokio::io::duplex(64);
        let err = write_frame(&mut a, "0123456789", 4).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge(10, 4)));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected_on_read() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, "0123456789", 64).await.unwrap();
        let err = read_frame(&mut b, 4).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge(10, 4)));
    }

    #[tokio::test]
    async fn test_closed_peer_reports_connection_closed() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let err = read_frame(&mut b, 64).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(2).await.unwrap();
        a.write_all(&[0xff, 0xfe]).await.unwrap();
        let err = read_frame(&mut b, 64).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidEncoding));
    }
}
