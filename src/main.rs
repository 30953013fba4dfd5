use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use novyny::news::{start_updater, ExtractorApiClient, GnewsClient, Renderer};
use novyny::web::{AppState, WebServer};
use novyny::{open_store, Config, ContentCache, RefreshPipeline};

#[tokio::main]
async fn main() -> novyny::Result<()> {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };
    config.validate()?;

    // Initialize logging
    if let Err(e) = novyny::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        novyny::logging::init_console_only(&config.logging.level);
    }

    info!("novyny - Ukrainian headline aggregator");
    info!(
        "Cache backend: {}, refresh interval: {}s",
        config.cache.backend, config.feed.interval_secs
    );

    let store = open_store(&config.cache).await?;
    let cache = Arc::new(ContentCache::new(
        store,
        Duration::from_secs(config.cache.lock_ttl_secs),
    ));

    let feed = GnewsClient::new(config.feed.clone())?;
    let extractor = ExtractorApiClient::new(config.extractor.clone())?;
    let renderer = Arc::new(Renderer::new(
        &config.display.timezone,
        &config.display.site_title,
    )?);

    let pipeline = Arc::new(RefreshPipeline::new(
        cache.clone(),
        Box::new(feed),
        Box::new(extractor),
        renderer.clone(),
        &config,
    ));

    let _updater = start_updater(pipeline.clone(), config.feed.interval_secs);

    let state = Arc::new(AppState::new(cache, pipeline, renderer));
    WebServer::new(&config.server, state)?.run().await
}
