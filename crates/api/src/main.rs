use std::sync::Arc;

use anyhow::Context;

use portcullis_api::app::{self, Services};
use portcullis_api::config::ApiConfig;
use portcullis_api::seed::Seed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env()?;
    portcullis_observability::init(config.log_format);

    let seed = match &config.seed_path {
        Some(path) => Seed::load(path)?,
        None => {
            tracing::warn!("PORTCULLIS_SEED not set; starting with no roles or actors");
            Seed::default()
        }
    };

    let services = Arc::new(
        Services::bootstrap(&config, seed)
            .await
            .context("failed to bootstrap authorization services")?,
    );
    let _refresher = services.spawn_role_refresher();

    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
