use std::{fmt, process::ExitStatus};

use aes::cipher::block_padding::UnpadError;
use thiserror::Error;

/// Which request in the download a fetch error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Manifest,
    Key,
    /// Zero-based index of the segment in manifest order.
    Segment(usize),
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStage::Manifest => write!(f, "manifest"),
            FetchStage::Key => write!(f, "key"),
            FetchStage::Segment(index) => write!(f, "segment #{index}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum NeedleError {
    #[error("HTTP error while fetching {stage}: {status}")]
    HttpError {
        stage: FetchStage,
        status: reqwest::StatusCode,
    },

    #[error("Network error while fetching {stage}: {source}")]
    Network {
        stage: FetchStage,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClientError(#[source] reqwest::Error),

    #[error("Invalid m3u8 file: {0}")]
    M3u8ParseError(String),

    #[error("Invalid IV: {0}")]
    InvalidIv(String),

    #[error("Invalid segment uri: {0}")]
    InvalidSegmentUri(String),

    #[error("Unsupported key method: {0}")]
    UnsupportedKeyMethod(String),

    #[error("Segment #{0} switches between clear and encrypted data")]
    KeyChanged(usize),

    #[error("Invalid key length: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("Ciphertext length {0} is not a multiple of the block size")]
    InvalidCiphertextLength(usize),

    #[error("Padding length {padding} exceeds decrypted length {len}")]
    InvalidPadding { padding: u8, len: usize },

    #[error("Pkcs7 unpad error")]
    UnpadError(#[from] UnpadError),

    #[error("Segment #{0} was never delivered by its worker")]
    SegmentLost(usize),

    #[error("ffmpeg exited with {0}")]
    RemuxFailed(ExitStatus),

    #[error("Download cancelled")]
    Cancelled,

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    MissingExecutable(#[from] which::Error),
}

impl NeedleError {
    /// Whether retrying the same request may succeed.
    ///
    /// Only transport failures qualify. A status error is an answer from the server.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NeedleError::Network { .. })
    }

    pub fn stage(&self) -> Option<FetchStage> {
        match self {
            NeedleError::HttpError { stage, .. } | NeedleError::Network { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

pub type NeedleResult<T> = Result<T, NeedleError>;
