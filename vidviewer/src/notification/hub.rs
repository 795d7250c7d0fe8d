//! Fan-out of hub messages to connected clients.
//!
//! Each client owns a bounded queue drained by its websocket task, so a slow
//! or dead client never blocks delivery to the others.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::events::HubMessage;

/// Identifier handed out to each connected client.
pub type ClientId = Uuid;

/// Per-client queue capacity.
const CLIENT_QUEUE_CAPACITY: usize = 64;

/// The set of connected clients.
#[derive(Default)]
pub struct NotificationHub {
    clients: RwLock<HashMap<ClientId, mpsc::Sender<String>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client; the receiver yields serialized messages.
    pub fn add_client(&self) -> (ClientId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        self.clients.write().insert(id, tx);
        debug!(client_id = %id, "Client connected");
        (id, rx)
    }

    pub fn remove_client(&self, id: &ClientId) {
        if self.clients.write().remove(id).is_some() {
            debug!(client_id = %id, "Client disconnected");
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Deliver a message to every client. Returns how many accepted it.
    ///
    /// Failures are logged per client; closed clients are dropped.
    pub fn write_to_clients(&self, message: &HubMessage) -> usize {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to serialize hub message");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let clients = self.clients.read();
            for (id, tx) in clients.iter() {
                match tx.try_send(payload.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(client_id = %id, kind = message.kind(), "Client queue full, message dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut clients = self.clients.write();
            for id in &closed {
                clients.remove(id);
                debug!(client_id = %id, "Pruned closed client");
            }
        }

        delivered
    }
}

/// Broadcast through an optional hub; a missing hub is a no-op.
pub fn notify(hub: Option<&NotificationHub>, message: HubMessage) {
    match hub {
        Some(hub) => {
            hub.write_to_clients(&message);
        }
        None => debug!(kind = message.kind(), "No notification hub, message dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_to_every_client() {
        let hub = NotificationHub::new();
        let (_a, mut rx_a) = hub.add_client();
        let (_b, mut rx_b) = hub.add_client();

        let delivered = hub.write_to_clients(&HubMessage::VideoDownloadSuccess);

        assert_eq!(delivered, 2);
        let expected = r#"{"type":"video_download_success"}"#;
        assert_eq!(rx_a.recv().await.unwrap(), expected);
        assert_eq!(rx_b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_closed_client_does_not_block_others() {
        let hub = NotificationHub::new();
        let (_dead, rx_dead) = hub.add_client();
        let (_live, mut rx_live) = hub.add_client();
        drop(rx_dead);

        let delivered = hub.write_to_clients(&HubMessage::VideoDownloadFail);

        assert_eq!(delivered, 1);
        assert_eq!(
            rx_live.recv().await.unwrap(),
            r#"{"type":"video_download_fail"}"#
        );
        assert_eq!(hub.client_count(), 1);
    }

    #[test]
    fn test_remove_client() {
        let hub = NotificationHub::new();
        let (id, _rx) = hub.add_client();
        hub.remove_client(&id);
        assert_eq!(hub.client_count(), 0);
        assert_eq!(hub.write_to_clients(&HubMessage::RootFolderNotFound), 0);
    }

    #[test]
    fn test_notify_without_hub_is_noop() {
        notify(None, HubMessage::FfmpegNotFound);
    }
}
