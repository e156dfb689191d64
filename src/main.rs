use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use filedrop::{
    config::Config,
    create_app,
    database::init_db,
    records::init_records,
    state::AppState,
    storage::init_storage,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    let pool = init_db(config.database_url.as_deref()).await;

    let records = init_records(&config, pool)
        .await
        .context("Failed to open record stores")?;

    let storage = init_storage(&config)
        .await
        .context("Failed to initialize storage")?;

    let app_state = AppState {
        records,
        storage,
        config: config.clone(),
    };

    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
