//! Process-level lifecycle events.
//!
//! Every veil entry point (the injected per-process worker, the CLI) emits
//! these at the edges of a coordinated run, so starts, stops and failures
//! line up in the logs across cooperating processes.

use tracing::{error, info};

use crate::errors::VeilError;
use crate::registry::Registry;

/// This process obtained its registry handle and joins the coordinated run.
pub fn log_run_started(registry: &Registry) {
    info!(
        event = "core.app.run_started",
        version = env!("CARGO_PKG_VERSION"),
        registry_mode = %registry.mode()
    );
}

/// This process is done coordinating and is about to detach.
pub fn log_run_finished(registry: &Registry) {
    info!(
        event = "core.app.run_finished",
        registry_mode = %registry.mode(),
        windows_modified = registry.count_modified()
    );
}

/// A failure that ends the current operation.
pub fn log_app_error(error: &dyn VeilError) {
    error!(
        event = "core.app.error_occurred",
        error = %error,
        error_code = error.error_code()
    );
}
