//! Streaming text-generation client with a time-bounded completion cache.
//!
//! [`GenerationClient::stream_generate`] posts a [`GenerationRequest`] to
//! `{base_url}/generate-stream`, forwards every server-sent chunk to a caller
//! sink and caches the assembled text. Identical requests within the TTL are
//! replayed from the cache one character at a time.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod sse;

pub use cache::{CacheEntry, CacheKey, ResponseCache};
pub use client::GenerationClient;
pub use config::ClientConfig;
pub use error::{GenerationError, Result};
pub use models::{Endpoint, GenerationRequest, GenerationResponse, ModelKind};
