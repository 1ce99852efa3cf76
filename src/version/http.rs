//! HTTP access shared by registries and the installer
//!
//! Every request has a fixed timeout and is retried a bounded number of times
//! with linear backoff on connection errors, timeouts and 5xx responses.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use reqwest::Url;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::version::error::RegistryError;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    github_token: Option<String>,
    github_api_host: Option<String>,
    max_retries: u32,
    backoff: Duration,
}

impl HttpClient {
    /// Creates a client; `github_token` is sent only to the host of `github_api_url`
    pub fn new(
        config: &HttpConfig,
        github_token: Option<String>,
        github_api_url: &str,
    ) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent("setup-beam")
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            github_token: github_token.filter(|t| !t.is_empty()),
            github_api_host: Url::parse(github_api_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string)),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Fetch a document as text
    pub async fn get_text(&self, url: &str) -> Result<String, RegistryError> {
        let url = parse_url(url)?;
        let response = self.send(&url).await?;
        Ok(response.text().await?)
    }

    /// Fetch every page of a paginated listing at once and return the bodies
    /// in page order. Fails if any page fails.
    pub async fn get_pages(&self, url: &str, pages: &[u32]) -> Result<Vec<String>, RegistryError> {
        let base = parse_url(url)?;
        let requests = pages.iter().map(|page| {
            let mut page_url = base.clone();
            page_url
                .query_pairs_mut()
                .append_pair("page", &page.to_string());
            async move {
                let response = self.send(&page_url).await?;
                Ok::<_, RegistryError>(response.text().await?)
            }
        });

        join_all(requests).await.into_iter().collect()
    }

    /// Stream `url` into the file at `dest`
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), RegistryError> {
        let url = parse_url(url)?;
        let response = self.send(&url).await?;

        let write_error = |source| RegistryError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = File::create(dest).await.map_err(write_error)?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_error)?;

        debug!("Downloaded {} bytes from {} to {:?}", written, url, dest);
        Ok(())
    }

    async fn send(&self, url: &Url) -> Result<reqwest::Response, RegistryError> {
        let mut attempt = 0;
        loop {
            let error = match self.request(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(RegistryError::NotFound(url.to_string()));
                    }
                    let error = RegistryError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    };
                    if !status.is_server_error() {
                        warn!("{}", error);
                        return Err(error);
                    }
                    error
                }
                Err(e) => RegistryError::Network(e),
            };

            if attempt >= self.max_retries {
                warn!("Giving up on {} after {} attempts: {}", url, attempt + 1, error);
                return Err(error);
            }
            attempt += 1;
            debug!("Attempt {} for {} failed: {}; retrying", attempt, url, error);
            sleep(self.backoff * attempt).await;
        }
    }

    fn request(&self, url: &Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url.clone());
        match (&self.github_token, &self.github_api_host) {
            (Some(token), Some(host)) if url.host_str() == Some(host.as_str()) => {
                request.bearer_auth(token)
            }
            _ => request,
        }
    }
}

fn parse_url(url: &str) -> Result<Url, RegistryError> {
    Url::parse(url).map_err(|e| RegistryError::InvalidResponse(format!("invalid URL {}: {}", url, e)))
}
