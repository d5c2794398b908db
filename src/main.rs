use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

mod clients;
mod config;
mod load;
mod mapping;
mod models;
mod state;
mod sync;
mod transform;

use crate::clients::{ElasticsearchClient, FilmworkExtractor, RedisClient, SearchSink};
use crate::config::Config;
use crate::load::Loader;
use crate::mapping::movies_index_schema;
use crate::sync::SyncEngine;

fn print_usage() {
    println!("etl-service: incremental Postgres to Elasticsearch sync");
    println!();
    println!("USAGE:");
    println!("  etl-service              run the sync loop");
    println!("  etl-service init-index   (re)create the destination index and exit");
    println!("  etl-service help         show this message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("info".parse().unwrap());
    fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .init();

    let cfg = Config::from_env();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "init-index" => {
                let es_client = ElasticsearchClient::new(cfg.es_url.clone(), cfg.http_timeout_ms);
                es_client
                    .create_index(&cfg.es_index, &movies_index_schema())
                    .await?;
                return Ok(());
            }
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown command: {}", other);
            }
        }
    }

    tracing::info!(
        index = %cfg.es_index,
        batch_size = cfg.batch_size,
        poll_interval_secs = cfg.poll_interval_secs,
        "Loaded configuration"
    );

    // Startup failures are fatal; once the loop is running, errors only back
    // off and retry.
    let pool = PgPoolOptions::new()
        .max_connections(cfg.pg_max_connections)
        .connect(&cfg.pg_dsn)
        .await?;

    let redis_client = RedisClient::new(&cfg.redis_url, &cfg.watermark_key).await?;
    let es_client = ElasticsearchClient::new(cfg.es_url.clone(), cfg.http_timeout_ms);

    let loader = Loader::new(
        Arc::new(es_client),
        cfg.es_index.clone(),
        cfg.bulk_retry_attempts,
        Duration::from_millis(cfg.bulk_retry_delay_ms),
    );
    let engine = SyncEngine::new(
        Arc::new(FilmworkExtractor::new(pool)),
        loader,
        Arc::new(redis_client),
        cfg,
    );

    tracing::info!("Starting sync loop");
    engine.run().await?;
    Ok(())
}
