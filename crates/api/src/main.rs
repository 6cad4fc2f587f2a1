//! Exam Proctoring Pipeline - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_logging(&settings.logging.level, settings.logging.json)?;

    info!("=== Exam Proctor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Camera {} at {}x{}, sampling every {}ms",
        settings.session.camera.device,
        settings.session.camera.width,
        settings.session.camera.height,
        settings.session.sample_interval_ms
    );

    run_server(settings).await
}
