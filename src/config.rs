use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Lumina";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/Lumina/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Lumina")
}

/// Get the SQLite database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("lumina.db")
}

/// Default log filter when RUST_LOG is not set
pub fn default_log_filter() -> &'static str {
    "info,lumina=debug"
}

/// Bind address for the HTTP server.
/// Overridable via LUMINA_ADDR (e.g. "0.0.0.0:8080").
pub fn bind_addr() -> SocketAddr {
    std::env::var("LUMINA_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
}

/// Gemini API key from the environment. Never persisted.
pub fn gemini_api_key() -> Option<String> {
    std::env::var("GEMINI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}
