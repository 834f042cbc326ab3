use std::sync::OnceLock;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

use crate::models::service_config::ServiceConfig;

static CONFIG_CACHE: OnceLock<ServiceConfig> = OnceLock::new();

pub async fn init_config_and_bind() -> Result<TcpListener, String> {
    let file_path = "reader.json";

    let data = fs::read_to_string(file_path)
        .await
        .map_err(|e| format!("File read Error: {e} {file_path}"))?;

    let mut config: ServiceConfig =
        serde_json::from_str(&data).map_err(|e| format!("JSON Parse Error: {e}"))?;

    let bind_addr = format!("{}:{}", config.connection.ip, config.connection.port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("Bind failed: {e}"))?;

    let actual_port = listener
        .local_addr()
        .map_err(|e| format!("Addr error: {e}"))?
        .port();

    // Port 0 in the config means "pick one"; record what we got.
    config.connection.port = actual_port;

    CONFIG_CACHE
        .set(config)
        .map_err(|_| "Config already initialized".to_string())?;

    info!("Config initialized with dynamic port: {}", actual_port);

    Ok(listener)
}

pub fn get_cached_config() -> &'static ServiceConfig {
    CONFIG_CACHE.get().expect("Config not initialized")
}
