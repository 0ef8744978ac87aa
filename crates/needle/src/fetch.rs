use bytes::Bytes;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{FetchStage, NeedleError, NeedleResult},
    retry::RetryPolicy,
    util::http::HttpClient,
};

/// Plain HTTP GET with retry and cancellation layered on top.
///
/// Every request of a track download goes through the same `Fetcher`, so a
/// single [`CancellationToken`] stops the manifest, key and segment requests alike.
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn fetch(&self, url: &Url, stage: FetchStage) -> NeedleResult<Bytes> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NeedleError::Cancelled),
            result = self.retry.run(|| self.fetch_once(url, stage)) => result,
        }
    }

    async fn fetch_once(&self, url: &Url, stage: FetchStage) -> NeedleResult<Bytes> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| NeedleError::Network { stage, source })?;

        if !response.status().is_success() {
            let status = response.status();
            if let Ok(body) = response.text().await {
                tracing::warn!("Error body: {body}");
            }
            return Err(NeedleError::HttpError { stage, status });
        }

        response
            .bytes()
            .await
            .map_err(|source| NeedleError::Network { stage, source })
    }
}
