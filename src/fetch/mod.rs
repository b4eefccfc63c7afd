//! Downloads the weekly menu page from the university website.
use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;
use url::Url;

use crate::error::Error;

/// The page sniffs user agents, so look like a desktop browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub fn make_client(timeout: Duration) -> crate::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(From::from)
}

/// Where the raw menu page comes from.
#[async_trait]
pub trait PageSource: Send + Sync + Debug {
    /// Returns the page body. Blank bodies are an [`Error::EmptyResponse`].
    async fn fetch_page(&self) -> crate::Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub const fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl PageSource for HttpSource {
    #[instrument(skip(self), fields(url = %self.url), level = "debug")]
    async fn fetch_page(&self) -> crate::Result<String> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        log::debug!("Got text of menu page in \t {:?}", start.elapsed());
        if text.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(text)
    }
}
