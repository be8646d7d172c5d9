use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tryon_core::{EffectCatalog, Intensity, SidecarProvider};

mod config;
mod dbus_interface;
mod engine;

const BUS_NAME: &str = "org.freedesktop.TryOn1";
const OBJECT_PATH: &str = "/org/freedesktop/TryOn1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("tryond starting");

    let config = config::Config::from_env();

    let catalog = match &config.catalog_path {
        Some(path) => EffectCatalog::load(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => EffectCatalog::builtin().context("parsing built-in catalog")?,
    };
    tracing::info!(effects = catalog.len(), "catalog loaded");

    let engine = engine::spawn_engine(&catalog, config.landmark_count, config.compositor_config())
        .context("starting compositing engine")?;

    let service = dbus_interface::TryOnService::new(
        engine,
        Arc::new(catalog),
        Arc::new(SidecarProvider::new(config.landmark_suffix.clone())),
        Intensity::saturating(i64::from(config.default_intensity)),
        Duration::from_secs(config.detect_timeout_secs),
    );

    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("registering on the session bus")?;

    tracing::info!(bus = BUS_NAME, "tryond ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("tryond shutting down");

    Ok(())
}
