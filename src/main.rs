use clap::Parser;
use marketplace_settlement::application::Stores;
use marketplace_settlement::application::marketplace::Marketplace;
use marketplace_settlement::config::{Cli, EngineConfig};
use marketplace_settlement::infrastructure::in_memory::{InMemoryBackend, InMemoryCatalog};
#[cfg(feature = "storage-rocksdb")]
use marketplace_settlement::infrastructure::rocksdb::RocksDBStore;
use marketplace_settlement::interfaces::csv::catalog_reader::CatalogReader;
use marketplace_settlement::interfaces::http;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// What `--dry-run` prints: the resolved settings and the seeded catalog size.
#[derive(Serialize)]
struct DryRun<'a> {
    cli: &'a Cli,
    engine: EngineConfig,
    products: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = cli.engine_config().into_diagnostic()?;
    let backend = InMemoryBackend::new();
    if let Some(path) = &cli.catalog {
        seed_products(&backend.catalog, path).await?;
    }
    if let Some(path) = &cli.sellers {
        seed_seller_rates(&backend.catalog, path).await?;
    }
    let stores = open_stores(&backend, cli.db_path.as_deref())?;

    if cli.dry_run {
        let summary = DryRun {
            cli: &cli,
            engine: config,
            products: backend.catalog.product_count().await,
        };
        println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        return Ok(());
    }

    let marketplace = Arc::new(Marketplace::new(stores, config));
    http::serve(marketplace, cli.bind).await.into_diagnostic()
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn seed_products(catalog: &InMemoryCatalog, path: &Path) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    for product in CatalogReader::new(file).products() {
        match product {
            Ok(product) => catalog.upsert_product(product).await,
            Err(e) => warn!(error = %e, path = %path.display(), "Skipping product row"),
        }
    }
    info!(products = catalog.product_count().await, "Catalog seeded");
    Ok(())
}

async fn seed_seller_rates(catalog: &InMemoryCatalog, path: &Path) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    for rate in CatalogReader::new(file).seller_rates() {
        match rate {
            Ok((seller_id, rate)) => catalog.set_seller_rate(seller_id, rate).await,
            Err(e) => warn!(error = %e, path = %path.display(), "Skipping seller row"),
        }
    }
    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(backend: &InMemoryBackend, db_path: Option<&Path>) -> Result<Stores> {
    let mut stores = backend.stores();
    if let Some(path) = db_path {
        let db = RocksDBStore::open(path).into_diagnostic()?;
        stores.orders = Arc::new(db.clone());
        stores.payments = Arc::new(db.clone());
        stores.refunds = Arc::new(db.clone());
        stores.refund_commits = Arc::new(db.clone());
        stores.payouts = Arc::new(db.clone());
        stores.ledger = Arc::new(db.clone());
        stores.reconciliation = Arc::new(db);
        info!(path = %path.display(), "Using RocksDB storage");
    }
    Ok(stores)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(backend: &InMemoryBackend, db_path: Option<&Path>) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(backend.stores())
}
