//! Database models.

pub mod playlist;
pub mod video;

pub use playlist::{ALL_PLAYLIST_ID, PlaylistDbModel};
pub use video::{PlaylistVideoQuery, SortOrder, VideoDbModel, VideoLookupField};
