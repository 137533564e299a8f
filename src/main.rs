use anyhow::Context;
use tracing_subscriber::EnvFilter;

use gt06_gateway::{Gateway, GatewayConfig, LoggingSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("GT06_CONFIG") {
        Ok(path) => GatewayConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        Err(_) => GatewayConfig::default(),
    };
    let config = config.with_env_overrides().context("applying environment overrides")?;

    Gateway::serve(config, LoggingSink).await.context("gateway stopped with an error")
}
