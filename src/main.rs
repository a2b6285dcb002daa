use clap::Parser; // for cli
use std::io::Write;
use std::time::Instant;
use streamgen::config::Args;
use streamgen::{ClientConfig, GenerationClient, metrics};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const FALLBACK_MESSAGE: &str = "I'm sorry, I couldn't process your request right now. \
The API connection might be down or experiencing issues.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // parse cli arguments
    let args = Args::parse();
    let config = ClientConfig::from(&args);

    info!("Streaming from {}", config.base_url);
    info!("Cache TTL: {:?}", config.cache_ttl);

    let client = GenerationClient::new(config)?;
    let request = args.request();

    for round in 1..=args.repeat.max(1) {
        let start_time = Instant::now();
        let mut chunks = 0usize;

        let result = client
            .stream_generate(&request, |chunk| {
                chunks += 1;
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();

        match result {
            Ok(response) => {
                let secs = start_time.elapsed().as_secs_f64();
                info!(
                    round,
                    chunks,
                    chars = response.generated.chars().count(),
                    tokens_per_second = chunks as f64 / secs.max(1e-3),
                    "generation finished"
                );
            }
            Err(e) => {
                error!(round, error = %e, "generation failed");
                println!("{}", FALLBACK_MESSAGE);
                std::process::exit(1);
            }
        }
    }

    if args.metrics {
        print!("{}", metrics::render());
    }
    Ok(())
}
