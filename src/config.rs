use clap::Parser;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::models::{GenerationRequest, ModelKind};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // Backend root, without the endpoint path
    pub base_url: String,
    // How long a completed response may be replayed
    pub cache_ttl: Duration,
    // Fail a stream that stays silent this long (None waits forever)
    pub idle_timeout: Option<Duration>,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: DEFAULT_TTL,
            idle_timeout: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "streamgen")]
#[command(about = "Stream a completion from a text-generation backend")]
pub struct Args {
    // Prompt to complete
    pub prompt: String,

    // Backend url
    #[arg(short, long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    // Cache TTL in seconds
    #[arg(short, long, default_value_t = 300)]
    pub cache_ttl: u64,

    // Idle timeout in seconds, 0 disables it
    #[arg(long, default_value_t = 0)]
    pub idle_timeout: u64,

    // Max length to generate
    #[arg(short, long)]
    pub length: Option<u32>,

    #[arg(short, long)]
    pub temperature: Option<f64>,

    // Model id, e.g. "virtue-v1" or "transformer"
    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(long)]
    pub top_k: Option<u32>,

    #[arg(long)]
    pub top_p: Option<f64>,

    #[arg(long)]
    pub repetition_penalty: Option<f64>,

    // Send the same request this many times (repeats are served from cache)
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    // Print metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

impl Args {
    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt.clone(),
            length: self.length,
            temperature: self.temperature,
            model: self.model.as_deref().map(ModelKind::from_model_id),
            top_k: self.top_k,
            top_p: self.top_p,
            repetition_penalty: self.repetition_penalty,
        }
    }
}

impl From<&Args> for ClientConfig {
    fn from(args: &Args) -> Self {
        let config = ClientConfig::new(args.base_url.clone())
            .with_cache_ttl(Duration::from_secs(args.cache_ttl));
        if args.idle_timeout > 0 {
            config.with_idle_timeout(Duration::from_secs(args.idle_timeout))
        } else {
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_conventions() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn args_build_request_and_config() {
        let args = Args::parse_from([
            "streamgen",
            "Hi",
            "--model",
            "virtue-v1",
            "--temperature",
            "0.5",
            "--top-k",
            "40",
            "--idle-timeout",
            "30",
        ]);

        let req = args.request();
        assert_eq!(req.prompt, "Hi");
        assert_eq!(req.model, Some(ModelKind::Rnn));
        assert_eq!(req.temperature, Some(0.5));
        assert_eq!(req.top_k, Some(40));
        assert_eq!(req.length, None);

        let config = ClientConfig::from(&args);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
    }
}
