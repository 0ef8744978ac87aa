use std::{ops::Deref, sync::Arc};

use reqwest::{Client, ClientBuilder, Url};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};

use crate::error::{NeedleError, NeedleResult};

/// A [`Client`] sharing one cookie store across manifest, key and segment requests.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    cookies_store: Arc<CookieStoreMutex>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> NeedleResult<Self> {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder
            .cookie_provider(cookies_store.clone())
            .build()
            .map_err(NeedleError::HttpClientError)?;

        Ok(Self {
            client,
            cookies_store,
        })
    }

    /// Adds `Set-Cookie` style strings scoped to `url`. Unparsable cookies are skipped.
    pub fn add_cookies<I, S>(&self, cookies: I, url: &Url)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Ok(mut lock) = self.cookies_store.lock() else {
            tracing::warn!("Cookie store is poisoned, cookies ignored.");
            return;
        };
        for cookie in cookies {
            if let Err(e) = lock.parse(cookie.as_ref(), url) {
                tracing::warn!("Ignored invalid cookie: {e}");
            }
        }
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
