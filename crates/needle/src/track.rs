use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use reqwest::Url;

use crate::{
    decrypt::PaddingMode,
    error::NeedleResult,
    fetch::Fetcher,
    hls::{resolve_stream_key, ManifestResolver, UrlResolution},
    pipeline::SegmentPipeline,
    remux::remux,
};

/// Downloads one track: playlist, key, segments, and optionally a final remux.
///
/// Unlike [`SegmentPipeline`], a failed download does not leave a partial
/// file behind.
pub struct TrackDownload {
    fetcher: Fetcher,
    manifest_url: Url,
    output_dir: PathBuf,

    resolution: UrlResolution,
    padding: PaddingMode,
    concurrency: NonZeroU32,
    manual_key: Option<String>,

    output: Option<PathBuf>,
    remux: bool,
    keep_intermediate: bool,
}

impl TrackDownload {
    pub fn new<P>(fetcher: Fetcher, manifest_url: Url, output_dir: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            fetcher,
            manifest_url,
            output_dir: output_dir.into(),
            resolution: UrlResolution::default(),
            padding: PaddingMode::default(),
            concurrency: NonZeroU32::MIN,
            manual_key: None,
            output: None,
            remux: false,
            keep_intermediate: false,
        }
    }

    pub fn resolution(mut self, resolution: UrlResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding;
        self
    }

    pub fn concurrency(mut self, concurrency: NonZeroU32) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Hex encoded key used instead of the one referenced by the playlist.
    pub fn manual_key(mut self, key: Option<String>) -> Self {
        self.manual_key = key;
        self
    }

    /// Final location of the track. Without it the decrypted file keeps its generated name.
    pub fn output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Remux into [`output`](Self::output) with ffmpeg instead of moving the decrypted file there.
    pub fn remux(mut self, remux: bool) -> Self {
        self.remux = remux;
        self
    }

    pub fn keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    pub async fn run(self) -> NeedleResult<PathBuf> {
        let remux_output = match &self.output {
            Some(output) if self.remux => {
                // fail before downloading anything
                which::which("ffmpeg")?;
                Some(output.clone())
            }
            _ => None,
        };

        let manifest = ManifestResolver::new(&self.fetcher)
            .with_resolution(self.resolution)
            .resolve(self.manifest_url.clone())
            .await?;

        let key = match &manifest.key {
            Some(key) => {
                Some(resolve_stream_key(&self.fetcher, key, self.manual_key.as_deref()).await?)
            }
            None => None,
        };

        let pipeline = SegmentPipeline::new(&self.output_dir)
            .concurrency(self.concurrency)
            .padding(self.padding);
        let partial = pipeline.output_path().to_path_buf();
        let decrypted = match pipeline
            .run(&self.fetcher, &manifest.segments, key.as_ref())
            .await
        {
            Ok(path) => path,
            Err(e) => {
                remove_file_if_exists(&partial).await;
                return Err(e);
            }
        };

        if let Some(output) = remux_output {
            tracing::info!("Remuxing to {}...", output.display());
            if let Err(e) = remux(&decrypted, &output).await {
                tracing::warn!("Decrypted stream kept at {}", decrypted.display());
                return Err(e);
            }
            if !self.keep_intermediate {
                remove_file_if_exists(&decrypted).await;
            }
            return Ok(output);
        }

        match self.output {
            Some(output) => {
                move_file(&decrypted, &output).await?;
                Ok(output)
            }
            None => Ok(decrypted),
        }
    }
}

async fn remove_file_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {e}", path.display()),
    }
}

async fn move_file(from: &Path, to: &Path) -> NeedleResult<()> {
    if let Some(dir) = to.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    if tokio::fs::rename(from, to).await.is_err() {
        // rename does not work across file systems
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}
