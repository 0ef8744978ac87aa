use m3u8_rs::{KeyMethod, MediaPlaylist};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{
    error::{NeedleError, NeedleResult},
    fetch::Fetcher,
    hls::utils::{decode_iv, load_m3u8, playlist_base},
};

/// How segment and key uris found in a playlist are turned into urls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UrlResolution {
    /// Absolute uris are used as they are, relative ones are joined onto the playlist base.
    #[default]
    Auto,
    /// Every uri is appended verbatim to the playlist base directory.
    ManifestRelative,
    /// Every uri must already be absolute.
    Absolute,
}

impl UrlResolution {
    pub fn resolve(&self, base: &Url, uri: &str) -> NeedleResult<Url> {
        match self {
            UrlResolution::Auto => match Url::parse(uri) {
                Ok(url) => Ok(url),
                Err(url::ParseError::RelativeUrlWithoutBase) => Ok(base.join(uri)?),
                Err(e) => Err(e.into()),
            },
            UrlResolution::ManifestRelative => {
                Ok(Url::parse(&format!("{base}{}", uri.trim_start_matches('/')))?)
            }
            UrlResolution::Absolute => match Url::parse(uri) {
                Ok(url) => Ok(url),
                Err(url::ParseError::RelativeUrlWithoutBase) => {
                    Err(NeedleError::InvalidSegmentUri(uri.to_string()))
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Key uris are always allowed to be relative to the playlist.
    pub fn resolve_key(&self, base: &Url, uri: &str) -> NeedleResult<Url> {
        match self {
            UrlResolution::Absolute => UrlResolution::Auto.resolve(base, uri),
            resolution => resolution.resolve(base, uri),
        }
    }
}

/// Where to fetch the stream key from, and the IV to decrypt with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub uri: Url,
    pub iv: [u8; 16],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    /// Url of the media playlist, after following a master playlist if there was one.
    pub url: Url,
    /// Base every relative uri was resolved against.
    pub base: Url,
    /// Segment urls in playlist order.
    pub segments: Vec<Url>,
    /// `None` when the stream is not encrypted.
    pub key: Option<KeyDescriptor>,
}

impl ResolvedManifest {
    /// Builds the segment list of an already parsed media playlist.
    ///
    /// The key is taken from the first segment. A segment with a blank uri
    /// ends the list. A later segment may repeat the key but never switch
    /// between clear and encrypted data.
    pub fn from_playlist(
        url: Url,
        playlist: &MediaPlaylist,
        resolution: UrlResolution,
    ) -> NeedleResult<Self> {
        let base = playlist_base(&url)?;

        let mut key = None;
        let mut segments = Vec::with_capacity(playlist.segments.len());
        for (i, segment) in playlist.segments.iter().enumerate() {
            if segment.uri.trim().is_empty() {
                tracing::debug!("Segment #{i} has no uri, stop reading playlist.");
                break;
            }

            if i == 0 {
                if let Some(k) = &segment.key {
                    key = key_descriptor(k, &base, playlist.media_sequence, resolution)?;
                }
            } else if let Some(k) = &segment.key {
                let next = key_descriptor(k, &base, playlist.media_sequence, resolution)?;
                match (&key, &next) {
                    (Some(first), Some(next)) if first != next => tracing::warn!(
                        "Segment #{i} declares another key, the first key is used."
                    ),
                    (Some(_), Some(_)) | (None, None) => {}
                    _ => return Err(NeedleError::KeyChanged(i)),
                }
            }

            segments.push(resolution.resolve(&base, &segment.uri)?);
        }

        Ok(Self {
            url,
            base,
            segments,
            key,
        })
    }
}

fn key_descriptor(
    key: &m3u8_rs::Key,
    base: &Url,
    media_sequence: u64,
    resolution: UrlResolution,
) -> NeedleResult<Option<KeyDescriptor>> {
    match &key.method {
        KeyMethod::None => Ok(None),
        KeyMethod::AES128 => {
            let uri = key.uri.as_deref().ok_or_else(|| {
                NeedleError::M3u8ParseError("AES-128 key without URI".to_string())
            })?;
            let iv = match &key.iv {
                Some(iv) => decode_iv(iv)?,
                None => (media_sequence as u128).to_be_bytes(),
            };
            Ok(Some(KeyDescriptor {
                uri: resolution.resolve_key(base, uri)?,
                iv,
            }))
        }
        method => Err(NeedleError::UnsupportedKeyMethod(format!("{method:?}"))),
    }
}

/// Turns a playlist url into segment urls and a key descriptor.
pub struct ManifestResolver<'a> {
    fetcher: &'a Fetcher,
    resolution: UrlResolution,
}

impl<'a> ManifestResolver<'a> {
    pub fn new(fetcher: &'a Fetcher) -> Self {
        Self {
            fetcher,
            resolution: UrlResolution::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: UrlResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub async fn resolve(&self, url: Url) -> NeedleResult<ResolvedManifest> {
        let (playlist_url, playlist) = load_m3u8(self.fetcher, url).await?;
        let manifest = ResolvedManifest::from_playlist(playlist_url, &playlist, self.resolution)?;
        tracing::info!(
            "{} segments found, encrypted: {}.",
            manifest.segments.len(),
            manifest.key.is_some()
        );
        Ok(manifest)
    }
}
