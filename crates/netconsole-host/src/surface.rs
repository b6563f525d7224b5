use netconsole_protocol::HostMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Handle to one presentation surface. In the original deployment this is an
/// editor webview; the shipped binary backs it with stdout; tests back it
/// with a channel.
pub trait Surface: Send + Sync {
    /// Posts a message into the surface. Delivery is fire-and-forget; a
    /// closed surface drops the message.
    fn deliver(&self, message: HostMessage);

    /// Brings the surface to the foreground. Optional for embedders without
    /// a notion of focus.
    fn reveal(&self) {}
}

/// Creates surfaces on demand. The view manager calls this once per tab.
pub trait SurfaceShell: Send + Sync {
    fn create_surface(&self, title: &str) -> Arc<dyn Surface>;
}

/// Channel-backed surface: messages land in an mpsc the embedder drains.
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<HostMessage>,
}

impl ChannelSurface {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Surface for ChannelSurface {
    fn deliver(&self, message: HostMessage) {
        if self.tx.send(message).is_err() {
            debug!(event = "surface_gone");
        }
    }
}
