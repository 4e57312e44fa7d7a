//! # In-Process Ports
//!
//! Two linked ends of an unbounded queue pair. The thread bridge runs its
//! link over one of these, and the tests use them to join two peers without
//! a socket.
//!
//! A buffer handed to `send` arrives whole at the other end's `recv`, so
//! framing is never needed. Once either end is dropped, the survivor's
//! `recv` yields `None` and its `send` fails with `ConnectionLost`.

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

use crate::transport;
use crate::transport::Transport;

/// One end of an in-process link.
pub struct ChannelTransport {
    outbox: UnboundedSender<Vec<u8>>,
    // Only the reader pump receives; the lock just makes `recv(&self)` sound.
    inbox: Mutex<UnboundedReceiver<Vec<u8>>>,
}

impl ChannelTransport {
    /// Creates two ends, each delivering into the other.
    pub fn pair() -> (Self, Self) {
        let (to_right, right_inbox) = unbounded_channel();
        let (to_left, left_inbox) = unbounded_channel();

        let left = Self { outbox: to_right, inbox: Mutex::new(left_inbox) };
        let right = Self { outbox: to_left, inbox: Mutex::new(right_inbox) };
        (left, right)
    }

    /// True once the other end has been dropped.
    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        self.outbox
            .send(payload.to_vec())
            .map_err(|_| transport::Error::ConnectionLost("other end of the port is gone".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(self.inbox.lock().await.recv().await)
    }
}
