pub mod api;
pub mod appointments; // appointment state machine
pub mod chat; // appointment-scoped chat relay
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod models;
pub mod notify; // notification dispatcher (rooms + email)
pub mod orders; // medicine order state machine
pub mod rooms; // per-user room registry
pub mod signaling; // WebRTC signaling relay

use tracing_subscriber::EnvFilter;

/// Initialize tracing from the environment, falling back to the default
/// filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
