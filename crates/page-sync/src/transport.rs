use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};
use crate::protocol::Envelope;

/// Where a session's outbound traffic goes. Implementations must preserve
/// call order.
pub trait OutboundSink: Send + Sync {
    fn send(&self, envelope: Envelope) -> TransportResult<()>;
    fn send_raw(&self, frame: Bytes) -> TransportResult<()>;
}

#[derive(Debug, Clone)]
pub enum Outbound {
    Message(Envelope),
    Raw(Bytes),
}

impl Outbound {
    pub fn as_message(&self) -> Option<&Envelope> {
        match self {
            Outbound::Message(envelope) => Some(envelope),
            Outbound::Raw(_) => None,
        }
    }

    /// JSON text of a message frame; raw frames are not JSON.
    pub fn to_json(&self) -> TransportResult<Option<String>> {
        match self {
            Outbound::Message(envelope) => Ok(Some(serde_json::to_string(envelope)?)),
            Outbound::Raw(_) => Ok(None),
        }
    }
}

/// Forwards outbound traffic into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl OutboundSink for ChannelSink {
    fn send(&self, envelope: Envelope) -> TransportResult<()> {
        self.sender
            .send(Outbound::Message(envelope))
            .map_err(|_| TransportError::Closed)
    }

    fn send_raw(&self, frame: Bytes) -> TransportResult<()> {
        self.sender
            .send(Outbound::Raw(frame))
            .map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;

    #[test_timeout::tokio_timeout_test]
    async fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        for idx in 0..3 {
            sink.send(Envelope {
                browser_session_id: "b".into(),
                execution_id: "e".into(),
                message: ServerMessage::CloseModal {
                    render_id: idx.to_string(),
                },
            })
            .unwrap();
        }
        sink.send_raw(Bytes::from_static(b"raw")).unwrap();

        for idx in 0..3 {
            let Some(Outbound::Message(envelope)) = rx.recv().await else {
                panic!("expected message");
            };
            let json = serde_json::to_value(&envelope).unwrap();
            assert_eq!(json["renderId"], idx.to_string());
        }
        assert!(matches!(rx.recv().await, Some(Outbound::Raw(_))));
    }

    #[test]
    fn closed_channel_reports_error() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(matches!(
            sink.send_raw(Bytes::new()),
            Err(TransportError::Closed)
        ));
    }
}
