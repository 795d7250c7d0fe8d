//! vidviewer library crate.
//!
//! A personal video library server: URL downloads driven by yt-dlp, disk
//! imports, playlists and live download status over WebSocket.

pub mod api;
pub mod config;
pub mod database;
pub mod downloader;
pub mod error;
pub mod files;
pub mod logging;
pub mod notification;
pub mod utils;

pub use error::{Error, Result};
