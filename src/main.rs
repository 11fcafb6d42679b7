use anyhow::{Context, Result};
use catalog_enrichment::ai::{AiEnricher, FileCacheStore, OpenAiTransport, RateLimiter, TokenAccounting};
use catalog_enrichment::batch::{read_products, BatchEnricher};
use catalog_enrichment::config::EnrichmentConfig;
use catalog_enrichment::enrichment::EnrichmentPipeline;
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    // Logs go to stderr; stdout carries the enriched records
    if json {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let input = args.first().map(String::as_str).unwrap_or("-");
    let output = args.get(1).map(String::as_str).unwrap_or("-");

    let config = EnrichmentConfig::from_env();
    info!("Starting catalog enrichment, input: {}, output: {}", input, output);

    let products = if input == "-" {
        read_products(io::stdin().lock())?
    } else {
        let file = File::open(input).with_context(|| format!("Failed to open input file {input}"))?;
        read_products(BufReader::new(file))?
    };

    let accounting = Arc::new(TokenAccounting::new());
    let ai = if config.ai.is_enabled() {
        match OpenAiTransport::new(&config.ai) {
            Ok(transport) => Some(AiEnricher::new(
                transport,
                Arc::new(FileCacheStore::open(config.ai.cache_path.clone())),
                Arc::new(RateLimiter::new(config.rate_limit.clone())),
                accounting.clone(),
                &config.ai,
            )),
            Err(e) => {
                warn!("AI lane disabled, transport setup failed: {}", e);
                None
            }
        }
    } else {
        info!("AI lane disabled");
        None
    };

    let pipeline = EnrichmentPipeline::with_config(&config.pipeline);
    let batch = BatchEnricher::new(pipeline, ai, config.concurrency);
    let results = batch.run(products).await;

    let mut writer: Box<dyn Write> = if output == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let file = File::create(output).with_context(|| format!("Failed to create output file {output}"))?;
        Box::new(BufWriter::new(file))
    };
    for result in &results {
        serde_json::to_writer(&mut writer, &result.product).context("Failed to serialize enriched product")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    for (model, usage) in accounting.snapshot() {
        info!(
            model = %model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Token usage"
        );
    }
    info!("Enriched {} products", results.len());

    Ok(())
}
