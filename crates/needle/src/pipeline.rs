use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::Url;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::{mpsc, Semaphore},
    task::JoinSet,
};

use crate::{
    decrypt::{PaddingMode, StreamKey},
    error::{FetchStage, NeedleError, NeedleResult},
    fetch::Fetcher,
    util::{ordered_stream::OrderedStream, path::unique_output_path},
};

/// Fetches, decrypts and concatenates segments into one file.
///
/// ```text
///            ┌──────────────┐   (index, plaintext)   ┌──────────────┐
///  seg #0 ──►│              ├───────────────────────►│              │
///  seg #1 ──►│   workers    │                        │ OrderedStream├──► write_all
///    ...  ──►│ fetch+decrypt├───────────────────────►│              │
///  seg #N ──►│ [Semaphore]  │                        │              │
///            └──────────────┘                        └──────────────┘
/// ```
///
/// With a concurrency of 1 (the default) no worker is spawned and every
/// segment is fetched, decrypted and written before the next one is requested.
/// With more workers, fetching and decryption overlap but the file is still
/// written strictly in playlist order. A permit is only given back once its
/// segment is written, so at most `concurrency` plaintexts are held in memory.
pub struct SegmentPipeline {
    output_path: PathBuf,
    concurrency: NonZeroU32,
    padding: PaddingMode,
}

impl SegmentPipeline {
    pub fn new<P>(output_dir: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            output_path: unique_output_path(output_dir),
            concurrency: NonZeroU32::MIN,
            padding: PaddingMode::default(),
        }
    }

    pub fn concurrency(mut self, concurrency: NonZeroU32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding;
        self
    }

    /// Where the output will be written. Known before [`run`](Self::run) so
    /// callers can remove a partial file after a failure.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Any error aborts the whole pipeline. The partially written file is left on disk.
    pub async fn run(
        self,
        fetcher: &Fetcher,
        segments: &[Url],
        key: Option<&StreamKey>,
    ) -> NeedleResult<PathBuf> {
        if let Some(dir) = self.output_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.output_path)
            .await?;

        tracing::info!(
            "Start downloading {} segment(s) with {} worker(s).",
            segments.len(),
            self.concurrency
        );

        if self.concurrency.get() == 1 || segments.len() <= 1 {
            self.run_sequential(fetcher, segments, key, &mut file)
                .await?;
        } else {
            self.run_ordered(fetcher, segments, key, &mut file).await?;
        }

        file.sync_all().await?;
        drop(file);

        tracing::info!("Segments written to {}.", self.output_path.display());
        Ok(self.output_path)
    }

    async fn run_sequential(
        &self,
        fetcher: &Fetcher,
        segments: &[Url],
        key: Option<&StreamKey>,
        file: &mut File,
    ) -> NeedleResult<()> {
        for (index, url) in segments.iter().enumerate() {
            let plaintext = process_segment(fetcher, index, url, key, self.padding).await?;
            file.write_all(&plaintext).await?;
            file.flush().await?;
            log_progress(index, segments.len());
        }
        Ok(())
    }

    async fn run_ordered(
        &self,
        fetcher: &Fetcher,
        segments: &[Url],
        key: Option<&StreamKey>,
        file: &mut File,
    ) -> NeedleResult<()> {
        let total = segments.len();
        let permits = Arc::new(Semaphore::new(self.concurrency.get() as usize));
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut ordered = OrderedStream::new(receiver);

        let dispatcher = {
            let fetcher = fetcher.clone();
            let segments = segments.to_vec();
            let key = key.cloned().map(Arc::new);
            let padding = self.padding;
            let permits = permits.clone();

            tokio::spawn(async move {
                // dropping this set aborts every running worker
                let mut workers = JoinSet::new();
                for (index, url) in segments.into_iter().enumerate() {
                    let Ok(permit) = permits.clone().acquire_owned().await else {
                        break;
                    };
                    let sender = sender.clone();
                    let fetcher = fetcher.clone();
                    let key = key.clone();
                    workers.spawn(async move {
                        let result =
                            process_segment(&fetcher, index, &url, key.as_deref(), padding).await;
                        _ = sender.send((index as u64, (result, permit)));
                    });
                }
                drop(sender);

                while let Some(joined) = workers.join_next().await {
                    if let Err(e) = joined {
                        tracing::error!("Segment worker stopped unexpectedly: {e}");
                    }
                }
            })
        };

        let written: NeedleResult<()> = async {
            while let Some((result, permit)) = ordered.next().await {
                let plaintext = result?;
                file.write_all(&plaintext).await?;
                file.flush().await?;
                // release the slot only after the segment is committed
                drop(permit);
                log_progress(ordered.next_seq() as usize - 1, total);
            }

            let committed = ordered.next_seq() as usize;
            if committed != total {
                return Err(NeedleError::SegmentLost(committed));
            }
            Ok(())
        }
        .await;

        if written.is_err() {
            dispatcher.abort();
        }
        _ = dispatcher.await;
        written
    }
}

async fn process_segment(
    fetcher: &Fetcher,
    index: usize,
    url: &Url,
    key: Option<&StreamKey>,
    padding: PaddingMode,
) -> NeedleResult<Vec<u8>> {
    tracing::debug!("Fetching segment #{index}: {url}");
    let ciphertext = fetcher.fetch(url, FetchStage::Segment(index)).await?;

    match key {
        Some(key) => key
            .decrypt(ciphertext.to_vec(), padding)
            .inspect_err(|e| tracing::error!("Failed to decrypt segment #{index}: {e}")),
        None => Ok(ciphertext.to_vec()),
    }
}

fn log_progress(index: usize, total: usize) {
    let done = index + 1;
    let percentage = done as f32 / total as f32 * 100.;
    tracing::info!("Processing segment #{index} finished. ({done} / {total} or {percentage:.2}%)");
}
