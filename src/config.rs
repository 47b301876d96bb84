use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Neurolink";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bind address when `NEUROLINK_ADDR` is unset.
const DEFAULT_ADDR: &str = "127.0.0.1:4870";

/// Default SQLite busy timeout when `NEUROLINK_BUSY_TIMEOUT_MS` is unset.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Get the application data directory (~/Neurolink/ on all platforms)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Default database file path
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("neurolink.db")
}

/// Default tracing filter; override with `NEUROLINK_LOG` or `RUST_LOG`.
pub fn default_log_filter() -> String {
    std::env::var("NEUROLINK_LOG").unwrap_or_else(|_| "info,neurolink=debug".to_string())
}

/// Server bind address, `NEUROLINK_ADDR` override.
pub fn bind_addr() -> SocketAddr {
    std::env::var("NEUROLINK_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| DEFAULT_ADDR.parse().expect("default address is valid"))
}

/// SQLite busy timeout, `NEUROLINK_BUSY_TIMEOUT_MS` override.
pub fn busy_timeout() -> Duration {
    std::env::var("NEUROLINK_BUSY_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_BUSY_TIMEOUT)
}

/// Optional mail relay endpoint; `None` disables outbound email.
pub fn mail_endpoint() -> Option<String> {
    std::env::var("NEUROLINK_MAIL_ENDPOINT")
        .ok()
        .filter(|s| !s.trim().is_empty())
}
