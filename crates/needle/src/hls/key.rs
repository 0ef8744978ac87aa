use crate::{
    decrypt::StreamKey,
    error::{FetchStage, NeedleResult},
    fetch::Fetcher,
    hls::KeyDescriptor,
};

/// Downloads the key referenced by the playlist. The response body is the raw key.
pub async fn fetch_stream_key(fetcher: &Fetcher, key: &KeyDescriptor) -> NeedleResult<StreamKey> {
    tracing::info!("Fetching stream key.");
    let key_bytes = fetcher.fetch(&key.uri, FetchStage::Key).await?;
    StreamKey::new(key_bytes.to_vec(), key.iv)
}

/// Uses `manual_key` (hex) when given, fetches the key otherwise.
pub async fn resolve_stream_key(
    fetcher: &Fetcher,
    key: &KeyDescriptor,
    manual_key: Option<&str>,
) -> NeedleResult<StreamKey> {
    match manual_key {
        Some(manual_key) => {
            tracing::debug!("Using manually specified key.");
            StreamKey::from_hex(manual_key, key.iv)
        }
        None => fetch_stream_key(fetcher, key).await,
    }
}
