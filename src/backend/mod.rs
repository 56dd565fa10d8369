//! Backend layer: concrete document feeds and write API clients.

pub mod credentials;
pub mod document;
pub mod http_api;
pub mod memory;

/// Returns the backend module name for smoke checks.
pub fn module_name() -> &'static str {
    "backend"
}
