//! Repository layer.

pub mod playlist;
pub mod playlist_video;
pub mod video;

pub use playlist::{PlaylistRepository, SqlxPlaylistRepository};
pub use playlist_video::{PlaylistVideoRepository, SqlxPlaylistVideoRepository};
pub use video::{SqlxVideoRepository, VideoRepository};
