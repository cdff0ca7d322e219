//! Message ports
//!
//! The scene reaches its host only through a [`MessagePort`]: an ordered,
//! reliable, bidirectional channel of JSON text frames. A failing port is
//! fatal for the session.

use scene_protocol::{InboundMessage, OutboundBatch, read_frame, write_frame};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{EcsError, Result};

/// Scene side of the message channel
pub trait MessagePort: Send {
    /// Queue a frame for the host without waiting for it
    fn send(&mut self, frame: String) -> Result<()>;

    /// Next frame received from the host, if one is waiting
    fn try_recv(&mut self) -> Result<Option<String>>;
}

/// A port backed by tokio unbounded channels
pub struct ChannelPort {
    tx: UnboundedSender<String>,
    rx: UnboundedReceiver<String>,
}

impl ChannelPort {
    /// Build a connected scene port and host endpoint
    pub fn pair() -> (ChannelPort, HostEndpoint) {
        let (scene_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, scene_rx) = mpsc::unbounded_channel();

        (
            ChannelPort {
                tx: scene_tx,
                rx: scene_rx,
            },
            HostEndpoint {
                tx: host_tx,
                rx: host_rx,
            },
        )
    }
}

impl MessagePort for ChannelPort {
    fn send(&mut self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| EcsError::Channel("host side of the channel is closed".to_string()))
    }

    fn try_recv(&mut self) -> Result<Option<String>> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EcsError::Channel(
                "host side of the channel is closed".to_string(),
            )),
        }
    }
}

/// Host side of a [`ChannelPort`], used by in-process hosts and tests
pub struct HostEndpoint {
    tx: UnboundedSender<String>,
    rx: UnboundedReceiver<String>,
}

impl HostEndpoint {
    /// Send a message to the scene
    pub fn send(&self, message: &InboundMessage) -> Result<()> {
        self.send_raw(message.to_json()?)
    }

    /// Send a raw text frame to the scene
    pub fn send_raw(&self, frame: impl Into<String>) -> Result<()> {
        self.tx
            .send(frame.into())
            .map_err(|_| EcsError::Channel("scene side of the channel is closed".to_string()))
    }

    /// Next batch from the scene, if one is waiting
    pub fn try_recv_batch(&mut self) -> Option<Result<OutboundBatch>> {
        let frame = self.rx.try_recv().ok()?;
        Some(OutboundBatch::from_json(&frame).map_err(Into::into))
    }

    /// Wait for the next batch; `None` once the scene side is gone
    pub async fn recv_batch(&mut self) -> Option<Result<OutboundBatch>> {
        let frame = self.rx.recv().await?;
        Some(OutboundBatch::from_json(&frame).map_err(Into::into))
    }

    /// Split into the raw sender and receiver
    pub fn into_parts(self) -> (UnboundedSender<String>, UnboundedReceiver<String>) {
        (self.tx, self.rx)
    }
}

/// Tasks pumping frames between a [`ChannelPort`] and a byte stream
pub struct StreamTasks {
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

impl StreamTasks {
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Connect a port to an async byte stream (TCP, child process stdio, ...)
///
/// Frames use the length-prefixed format of `scene_protocol`. When either
/// direction fails its task ends, which closes the matching side of the port.
/// Must be called from within a tokio runtime.
pub fn spawn_stream_port<R, W>(reader: R, writer: W, max_message_size: usize) -> (ChannelPort, StreamTasks)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (port, host) = ChannelPort::pair();
    let (to_scene, mut from_scene) = host.into_parts();

    let reader_task = tokio::spawn(async move {
        let mut reader = reader;
        loop {
            match read_frame(&mut reader, max_message_size).await {
                Ok(frame) => {
                    if to_scene.send(frame).is_err() {
                        debug!("Scene port dropped, stopping stream reader");
                        break;
                    }
                }
                Err(scene_protocol::ProtocolError::ConnectionClosed) => {
                    debug!("Host closed the stream");
                    break;
                }
                Err(e) => {
                    error!("Failed to read frame from host: {}", e);
                    break;
                }
            }
        }
    });

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(frame) = from_scene.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame, max_message_size).await {
                error!("Failed to write frame to host: {}", e);
                break;
            }
        }
    });

    (
        port,
        StreamTasks {
            reader: reader_task,
            writer: writer_task,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_protocol::{EntityId, OutboundOperation, read_message, write_message};
    use serde_json::Value;

    #[test]
    fn test_channel_pair_round_trip() {
        let (mut port, mut host) = ChannelPort::pair();

        let batch = OutboundBatch::new(
            1,
            vec![OutboundOperation::CreateEntity { entity_id: EntityId(1) }],
        );
        port.send(batch.to_json().unwrap()).unwrap();
        assert_eq!(host.try_recv_batch().unwrap().unwrap(), batch);

        host.send(&InboundMessage::event("click", None, Value::Null)).unwrap();
        let frame = port.try_recv().unwrap().unwrap();
        assert!(frame.contains("\"eventName\":\"click\""));
        assert_eq!(port.try_recv().unwrap(), None);
    }

    #[test]
    fn test_dropped_host_is_a_channel_error() {
        let (mut port, host) = ChannelPort::pair();
        drop(host);

        assert!(matches!(port.try_recv(), Err(EcsError::Channel(_))));
        assert!(matches!(port.send("{}".to_string()), Err(EcsError::Channel(_))));
    }

    #[tokio::test]
    async fn test_stream_port_frames_both_ways() {
        let (scene_io, host_io) = tokio::io::duplex(4096);
        let (scene_read, scene_write) = tokio::io::split(scene_io);
        let (mut host_read, mut host_write) = tokio::io::split(host_io);

        let (mut port, tasks) = spawn_stream_port(scene_read, scene_write, 4096);

        let batch = OutboundBatch::new(
            1,
            vec![OutboundOperation::CreateEntity { entity_id: EntityId(7) }],
        );
        port.send(batch.to_json().unwrap()).unwrap();
        let received: OutboundBatch = read_message(&mut host_read, 4096).await.unwrap();
        assert_eq!(received, batch);

        let event = InboundMessage::event("click", Some(EntityId(7)), Value::Null);
        write_message(&mut host_write, &event, 4096).await.unwrap();

        let frame = loop {
            if let Some(frame) = port.try_recv().unwrap() {
                break frame;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(InboundMessage::from_json(&frame).unwrap(), event);

        tasks.abort();
    }
}
