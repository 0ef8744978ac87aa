//! Downloads AES encrypted HLS audio streams into a single decrypted file.
//!
//! ```text
//!  manifest url
//!       │
//!       ▼
//! ┌──────────────────┐  segment urls   ┌──────────────────┐
//! │ ManifestResolver ├────────────────►│                  │
//! └────────┬─────────┘                 │                  │
//!          │ KeyDescriptor             │ SegmentPipeline  ├──► <dir>/<uuid>
//!          ▼                           │                  │
//! ┌──────────────────┐   StreamKey     │                  │
//! │ fetch_stream_key ├────────────────►│                  │
//! └──────────────────┘                 └──────────────────┘
//! ```
//!
//! [`TrackDownload`] runs the three steps above and optionally hands the
//! result to ffmpeg through [`remux`].

pub mod decrypt;
pub mod error;
pub mod fetch;
pub mod hls;
pub mod pipeline;
pub mod remux;
pub mod retry;
pub mod track;
pub mod util;

pub use decrypt::{PaddingMode, StreamKey};
pub use error::*;
pub use fetch::Fetcher;
pub use pipeline::SegmentPipeline;
pub use retry::RetryPolicy;
pub use tokio_util::sync::CancellationToken;
pub use track::TrackDownload;
pub use util::http::HttpClient;
