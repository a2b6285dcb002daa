use futures::StreamExt;
use reqwest::header::ACCEPT;
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::cache::{CacheKey, ResponseCache};
use crate::config::ClientConfig;
use crate::error::{GenerationError, Result};
use crate::metrics::{
    CACHE_HITS, CACHE_MISSES, CHUNKS_TOTAL, REQUEST_FAILURES, REQUEST_LATENCY, REQUEST_TOTAL,
};
use crate::models::{Endpoint, GenerationRequest, GenerationResponse};
use crate::sse;

/// Client for a text-generation backend.
///
/// Owns the completion cache; clones share it. Concurrent misses for the
/// same request are not merged: each performs its own round trip and the
/// last one to finish owns the cache entry.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    config: ClientConfig,
    cache: Arc<ResponseCache>,
}

impl GenerationClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self::with_http_client(http, config))
    }

    /// Build on an existing HTTP client.
    ///
    /// Inside a tokio runtime this also starts the cache sweeper, which stops
    /// by itself once the last clone of the client is dropped. Outside a
    /// runtime expired entries are only skipped, not removed, until
    /// `cache().spawn_sweeper()` is called.
    pub fn with_http_client(http: reqwest::Client, config: ClientConfig) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_ttl));
        if tokio::runtime::Handle::try_current().is_ok() {
            cache.spawn_sweeper();
        } else {
            debug!("No tokio runtime, cache sweeper not started");
        }
        Self {
            http,
            config,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint.path())
    }

    /// Generate text for `request`, passing each chunk to `on_token` as it
    /// arrives.
    ///
    /// A fresh cached result is replayed one character per call with no
    /// network I/O. Otherwise the request is streamed from the backend: the
    /// result starts with the prompt followed by every chunk in order, and is
    /// cached once the stream closes cleanly. Any failure is returned as-is
    /// and leaves the cache untouched.
    pub async fn stream_generate<F>(
        &self,
        request: &GenerationRequest,
        mut on_token: F,
    ) -> Result<GenerationResponse>
    where
        F: FnMut(&str),
    {
        REQUEST_TOTAL.inc();
        let start_time = Instant::now();
        let key = CacheKey::new(Endpoint::Stream, request);

        if let Some(entry) = self.cache.get(&key) {
            CACHE_HITS.inc();
            debug!(key = %key, age = ?entry.age(), "Cache HIT - replaying");
            replay(&entry.response.generated, &mut on_token);
            REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
            return Ok(entry.response);
        }
        CACHE_MISSES.inc();
        debug!(key = %key, "Cache MISS - streaming from backend");

        let result = self.stream_from_backend(request, &mut on_token).await;
        REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

        match result {
            Ok(generated) => {
                let response = GenerationResponse { generated };
                self.cache.insert(key, response.clone());
                Ok(response)
            }
            Err(e) => {
                REQUEST_FAILURES.inc();
                warn!(key = %key, error = %e, "stream failed, nothing cached");
                Err(e)
            }
        }
    }

    async fn stream_from_backend<F>(
        &self,
        request: &GenerationRequest,
        on_token: &mut F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let res = self
            .http
            .post(self.url(Endpoint::Stream))
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let res = check_status(res).await?;

        let mut chunks = pin!(sse::data_stream(Box::pin(res.bytes_stream())));
        let mut generated = request.prompt.clone();

        loop {
            let next = match self.config.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, chunks.next())
                    .await
                    .map_err(|_| GenerationError::IdleTimeout(limit))?,
                None => chunks.next().await,
            };
            let Some(chunk) = next else {
                break;
            };

            let chunk = chunk?;
            generated.push_str(&chunk);
            CHUNKS_TOTAL.inc();
            on_token(&chunk);
        }

        Ok(generated)
    }

    /// Non-streaming completion against the `/generate` endpoint.
    ///
    /// Shares the cache table and TTL with `stream_generate`, under its own
    /// keys, and stores the backend's body unchanged.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        REQUEST_TOTAL.inc();
        let start_time = Instant::now();
        let key = CacheKey::new(Endpoint::Complete, request);

        if let Some(entry) = self.cache.get(&key) {
            CACHE_HITS.inc();
            debug!(key = %key, "Cache HIT");
            REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
            return Ok(entry.response);
        }
        CACHE_MISSES.inc();
        debug!(key = %key, "Cache MISS - calling backend");

        let result = self.complete_from_backend(request).await;
        REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

        match result {
            Ok(response) => {
                self.cache.insert(key, response.clone());
                Ok(response)
            }
            Err(e) => {
                REQUEST_FAILURES.inc();
                warn!(key = %key, error = %e, "generate failed");
                Err(e)
            }
        }
    }

    async fn complete_from_backend(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let res = self
            .http
            .post(self.url(Endpoint::Complete))
            .json(request)
            .send()
            .await?;
        let res = check_status(res).await?;
        let body = res.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

// One call per character, in order
fn replay<F>(text: &str, on_token: &mut F)
where
    F: FnMut(&str),
{
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        on_token(ch.encode_utf8(&mut buf));
    }
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(GenerationError::Status { status, body })
}
