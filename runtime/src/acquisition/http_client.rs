//! Async HTTP client wrapping reqwest.
//!
//! Plain HTTP, no browser. Redirects and timeouts are handled here, along
//! with optional retries on 5xx or transport errors and backoff on 429.

use anyhow::Result;
use std::time::Duration;

use crate::renderer::DEFAULT_USER_AGENT;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for stylesheet acquisition.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for CDNs that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout_ms: u64,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client with a desktop Chrome user-agent and no retries.
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(DEFAULT_USER_AGENT)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout_ms,
            max_retries: 0,
        }
    }

    /// Retry a failing request up to `retries` extra times with exponential
    /// backoff.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Perform a single GET request.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        match self.get_inner(&self.client, url).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    self.get_inner(&self.h1_client, url).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> Result<HttpResponse> {
        let mut retries = 0u32;

        loop {
            let resp = client
                .get(url)
                .timeout(Duration::from_millis(self.timeout_ms))
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();
                    let final_url = r.url().to_string();

                    // Retry on 5xx
                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }

                    // Backoff on 429
                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let content_type = r
                        .headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);

                    let body = r.text().await?;

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        content_type,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Perform parallel GET requests with bounded concurrency. Results come
    /// back in input order.
    pub async fn get_many(&self, urls: &[String], concurrency: usize) -> Vec<Result<HttpResponse>> {
        use futures::stream::{self, StreamExt};

        stream::iter(urls.iter())
            .map(|url| {
                let client = self.clone();
                let u = url.clone();
                async move { client.get(&u).await }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1).min(6)))
}
