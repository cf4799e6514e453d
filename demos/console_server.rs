use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use inventory_console::api::ConsoleApp;
use inventory_console::config::ConsoleConfig;
use inventory_console::reports::{ReportSource, StreamOptions};
use inventory_console::store::{InventoryData, InventoryStore, TreeSource};

#[derive(Clone)]
struct DemoApp {
    reports: Arc<dyn ReportSource>,
    trees: Arc<dyn TreeSource>,
    config: Arc<ConsoleConfig>,
}

impl ConsoleApp for DemoApp {
    fn reports(&self) -> Arc<dyn ReportSource> {
        Arc::clone(&self.reports)
    }

    fn trees(&self) -> Arc<dyn TreeSource> {
        Arc::clone(&self.trees)
    }

    fn public_url(&self) -> Option<String> {
        self.config.public_url.clone()
    }

    fn stream_options(&self) -> StreamOptions {
        self.config.stream_options()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConsoleConfig::from_env().map_err(|err| anyhow!("{err}"))?;
    let bind_addr = config.bind;
    let app_state = build_state(config).await?;

    let app = Router::new()
        .route("/healthz", get(health_handler))
        .merge(inventory_console::api::routes::<DemoApp>())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;

    tracing::info!(%bind_addr, "inventory console listening");
    println!("reports: http://{}/reports/inventorySummary", bind_addr);
    println!("tree:    http://{}/tree/resources", bind_addr);

    axum::serve(listener, app)
        .await
        .context("console server failed")
}

async fn build_state(config: ConsoleConfig) -> anyhow::Result<DemoApp> {
    #[cfg(feature = "sqlx")]
    if let Some(database_url) = config.database_url.clone() {
        use inventory_console::db::{PgInventory, create_inventory_tables};
        use sqlx::postgres::PgPoolOptions;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("failed to connect to postgres")?;
        create_inventory_tables(&pool)
            .await
            .context("failed to run inventory migrations")?;

        let inventory = Arc::new(PgInventory::new(Arc::new(pool)));
        tracing::info!("serving inventory from postgres");
        return Ok(DemoApp {
            reports: inventory.clone(),
            trees: inventory,
            config: Arc::new(config),
        });
    }

    let data = if config.seed_demo {
        InventoryData::demo(Utc::now())
    } else {
        InventoryData::default()
    };
    tracing::info!(
        resources = data.resources.len(),
        seeded = config.seed_demo,
        "serving in-memory inventory"
    );
    let store = Arc::new(InventoryStore::new(data));
    Ok(DemoApp {
        reports: store.clone(),
        trees: store,
        config: Arc::new(config),
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}
