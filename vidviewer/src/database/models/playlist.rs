//! Playlist database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Id of the virtual playlist containing every completed video.
pub const ALL_PLAYLIST_ID: i64 = 0;

/// A user-defined playlist.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PlaylistDbModel {
    pub id: i64,
    pub name: String,
    pub date: String,
}

impl PlaylistDbModel {
    /// The virtual "All" playlist; never stored, cannot be edited.
    pub fn all() -> Self {
        Self {
            id: ALL_PLAYLIST_ID,
            name: "All".to_string(),
            date: String::new(),
        }
    }
}
