//! Headless admin server binary.

use tracing_subscriber::EnvFilter;

use config_admin_lib::app::SharedState;
use config_admin_lib::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting config admin server");

    let (store, dir) = config_admin_lib::init_foundation()?;
    let state = SharedState::new(store, dir, config_admin_lib::server_port());

    let server_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state).await {
            tracing::error!("Server failed: {e}");
        }
    });

    tracing::info!(
        port = state.server_port(),
        data_dir = %state.data_dir().display(),
        "Admin server running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    state.shutdown_token().cancel();
    server_handle.await?;
    Ok(())
}
