//! [`HttpFetcher`] over `reqwest`.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    futures::StreamExt,
    tokio::io::AsyncWriteExt,
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    ports::{HttpFetcher, HttpResponse, TempFileStore},
    temp::TempFile,
};

const DOWNLOAD_PREFIX: &str = "wprss-download";

/// User agent for plain downloads; the browser fallback overrides it.
const DEFAULT_USER_AGENT: &str = concat!("aggregator/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestFetcher {
    client: reqwest::Client,
    temp: Arc<dyn TempFileStore>,
}

impl ReqwestFetcher {
    #[must_use]
    pub fn new(temp: Arc<dyn TempFileStore>) -> Self {
        Self::with_client(reqwest::Client::new(), temp)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, temp: Arc<dyn TempFileStore>) -> Self {
        Self { client, temp }
    }

    async fn send(
        &self,
        url: &str,
        timeout: Duration,
        headers: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let mut request = self.client.get(url).timeout(timeout);
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
        {
            request = request.header(reqwest::header::USER_AGENT, DEFAULT_USER_AGENT);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.map_err(|e| transport_error(url, &e))
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::fetch(format!("timed out fetching {url}"))
    } else {
        Error::fetch(format!("failed to fetch {url}: {err}"))
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    /// Streams the body to disk chunk by chunk; nothing larger than one
    /// chunk is held in memory.
    async fn fetch_to_temp_file(&self, url: &str, timeout: Duration) -> Result<TempFile> {
        let response = self.send(url, timeout, &[]).await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(Error::Fetch {
                status: Some(status),
                message: format!("HTTP {status} fetching {url}"),
            });
        }

        let (temp, mut file) = self.temp.open(DOWNLOAD_PREFIX).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error(url, &e))?;
            written += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(format!("writing {}", temp.path().display()), e))?;
        }
        file.flush()
            .await
            .map_err(|e| Error::io(format!("flushing {}", temp.path().display()), e))?;
        drop(file);

        if written == 0 {
            return Err(Error::Fetch {
                status: Some(status),
                message: format!("empty response from {url}"),
            });
        }
        debug!(url, status, bytes = written, "downloaded");
        Ok(temp)
    }

    async fn get(
        &self,
        url: &str,
        timeout: Duration,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let response = self.send(url, timeout, headers).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, &e))?;
        debug!(url, status, bytes = body.len(), "fetched");
        Ok(HttpResponse {
            status,
            body: Vec::from(body),
        })
    }
}
