use m3u8_rs::{MediaPlaylist, Playlist};
use reqwest::Url;

use crate::{
    error::{FetchStage, NeedleError, NeedleResult},
    fetch::Fetcher,
};

/// Fetches `url` and returns the media playlist it points to.
///
/// A master playlist is followed to its highest bandwidth variant. The returned
/// url is the one of the media playlist, which is what segment uris are relative to.
#[async_recursion::async_recursion]
pub async fn load_m3u8(fetcher: &Fetcher, url: Url) -> NeedleResult<(Url, MediaPlaylist)> {
    tracing::info!("Start fetching M3U8 file.");

    let m3u8_bytes = fetcher.fetch(&url, FetchStage::Manifest).await?;
    let m3u8_parsed = m3u8_rs::parse_playlist_res(&m3u8_bytes)
        .map_err(|e| NeedleError::M3u8ParseError(e.to_string()))?;
    tracing::info!("M3U8 file fetched.");

    match m3u8_parsed {
        Playlist::MasterPlaylist(pl) => {
            tracing::info!("Master playlist input detected. Auto selecting best quality stream.");
            let variant = pl
                .variants
                .iter()
                .filter(|v| !v.is_i_frame)
                .max_by_key(|v| v.bandwidth)
                .ok_or_else(|| {
                    NeedleError::M3u8ParseError("master playlist has no variant".to_string())
                })?;
            let variant_url = url.join(&variant.uri)?;

            tracing::info!(
                "Best stream: {variant_url}; Bandwidth: {bandwidth}",
                bandwidth = variant.bandwidth
            );
            load_m3u8(fetcher, variant_url).await
        }
        Playlist::MediaPlaylist(pl) => Ok((url, pl)),
    }
}

/// Directory of the playlist, with query and fragment dropped.
///
/// `http://host/a/b/index.m3u8?token=1` becomes `http://host/a/b/`.
pub fn playlist_base(url: &Url) -> NeedleResult<Url> {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.join("./")?)
}

/// Decodes an `IV` attribute, with or without its `0x` marker.
pub fn decode_iv(iv: &str) -> NeedleResult<[u8; 16]> {
    let hex_iv = iv
        .strip_prefix("0x")
        .or_else(|| iv.strip_prefix("0X"))
        .unwrap_or(iv);
    let bytes = hex::decode(hex_iv).map_err(|e| NeedleError::InvalidIv(format!("{iv}: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        NeedleError::InvalidIv(format!("{iv}: expected 16 bytes, got {}", bytes.len()))
    })
}
