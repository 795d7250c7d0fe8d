//! Download lifecycle: tracking, orchestration and disk import.

pub mod broadcaster;
pub mod download;
pub mod engine;
pub mod import;
pub mod manager;
pub mod orchestrator;

pub use broadcaster::{StatusTicker, order_batch};
pub use download::{CancelOutcome, Download, DownloadStatus};
pub use import::{ImportReport, import_from_disk};
pub use manager::{DownloadManager, DownloadManagerConfig};
pub use orchestrator::{DownloadOrchestrator, DownloadOutcome, StartedDownload, SubmitRequest};
