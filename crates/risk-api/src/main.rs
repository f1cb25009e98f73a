//! Risk API binary entrypoint.

use prop_core::config::Config;
use prop_core::db;
use risk_api::{ApiServer, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first, so DATABASE_URL and friends can come from the file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "risk_api=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let core_config = Config::from_env()?;
    let pool = db::create_pool(&core_config.database).await?;

    let server_config = ServerConfig::from_env();
    let server = ApiServer::new(server_config, core_config, pool).await?;
    server.run().await?;

    Ok(())
}
