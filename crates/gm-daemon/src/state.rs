//! Shared state for gm-daemon handlers.

use std::sync::Arc;

use gm_core::MartStore;

/// Static build metadata included in the health response.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "gm-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Everything a request handler can reach. Per-request identity is not in
/// here; it travels with the request (see [`crate::identity::CallerId`]).
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub store: Arc<dyn MartStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MartStore>) -> Self {
        Self {
            build: BuildInfo::default(),
            store,
        }
    }
}
