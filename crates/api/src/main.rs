use anyhow::Context;

use tollgate_api::app::{self, AppServices};
use tollgate_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    tollgate_observability::init(config.log_format);

    let services = AppServices::from_config(&config)?;
    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(addr = %listener.local_addr()?, issuer = %config.issuer, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
