use std::sync::Arc;

use neurolink::api::start_server;
use neurolink::config;
use neurolink::core_state::CoreState;
use neurolink::notify::HttpMailer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    neurolink::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let db_path = config::default_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut core = CoreState::new(db_path);
    if let Some(endpoint) = config::mail_endpoint() {
        tracing::info!(endpoint = %endpoint, "outbound email enabled");
        core = core.with_mailer(Arc::new(HttpMailer::new(endpoint)));
    }

    let mut server = start_server(Arc::new(core), config::bind_addr()).await?;
    tracing::info!(addr = %server.addr, "listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.shutdown();
    Ok(())
}
