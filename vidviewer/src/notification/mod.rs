//! Push notifications to connected front-end clients.

pub mod events;
pub mod hub;

pub use events::{DownloadStatusSnapshot, HubMessage};
pub use hub::{ClientId, NotificationHub, notify};
