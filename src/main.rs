//! Mercado checkout - marketplace pricing and payment service

use anyhow::Result;
use mercado_checkout::api::{router, AppState};
use mercado_checkout::publisher::EventPublisher;
use mercado_checkout::store::{CatalogSeed, MemoryStore, PgStore, Store};
use mercado_checkout::{AppConfig, CheckoutService, PricingCalculator};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    tracing::info!(iva = %config.pricing.iva_rate, threshold = %config.pricing.shipping.free_shipping_threshold, flat_rate = %config.pricing.shipping.flat_rate, "pricing configured");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.max_connections).await?),
        None => {
            let seed = match &config.catalog_seed { Some(path) => CatalogSeed::from_path(path)?, None => CatalogSeed::default() };
            tracing::warn!(products = seed.products.len(), "DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::from_seed(seed).await?)
        }
    };
    let publisher = EventPublisher::connect(config.nats_url.as_deref()).await;
    let checkout = CheckoutService::new(store, PricingCalculator::new(config.pricing.clone()), publisher);

    let app = router(AppState::new(checkout)).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("Mercado checkout listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
