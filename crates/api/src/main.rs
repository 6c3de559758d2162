use anyhow::Context;

use railparcel_api::{app::build_app, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` first so LOG_FORMAT and RUST_LOG apply to the subscriber.
    dotenvy::dotenv().ok();
    railparcel_observability::init();

    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr;

    let app = build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
