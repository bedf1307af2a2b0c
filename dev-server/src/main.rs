//! Development backend for working on the dashboard without the real API.
//!
//! Serves the mock backend seeded with categories, events and users on
//! `PORT` (default 3000), the dashboard's default API address.
//!
//! Usage: cargo run -p dev-server

use anyhow::Result;
use test_helpers::fixtures::DevDataset;
use test_helpers::telemetry;
use tracing::info;

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let subscriber = telemetry::get_subscriber("info".into());
    telemetry::init_subscriber(subscriber)?;

    let port = match std::env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => DEFAULT_PORT,
    };

    info!("🚀 Starting Cartelera development backend");
    let app = test_helpers::spawn_app_on_port(port).await;
    info!("✅ Mock API running on {}", app.address);

    info!("📊 Setting up development data...");
    let dataset = DevDataset::create(&app)?;

    info!("🎯 Development backend ready!");
    info!("   API: {}", app.address);
    info!("   Dashboard: CARTELERA_API_URL={}", app.address);
    info!("");
    dataset.print_summary();
    info!("");
    info!("👋 Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutting down development backend");
    Ok(())
}
