//! Adapters around the external download and probe tools.

pub mod ffmpeg;
pub mod process_runner;
pub mod progress;
pub mod traits;
pub mod ytdlp;

pub use ffmpeg::Ffmpeg;
pub use process_runner::{ProcessOutcome, run_process};
pub use progress::{DownloadProgressUpdate, parse_progress_line};
pub use traits::{MediaDownloader, MediaProbe, VideoFormat, VideoInfo};
pub use ytdlp::YtDlp;
