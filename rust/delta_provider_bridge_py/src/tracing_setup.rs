use std::sync::OnceLock;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a process-wide fmt subscriber.
///
/// The filter is always parsed; once a subscriber is installed, later calls
/// change nothing.
#[pyfunction]
#[pyo3(signature = (filter = None))]
pub fn install_tracing(filter: Option<String>) -> PyResult<()> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(&directives).map_err(|err| {
            PyValueError::new_err(format!("Invalid tracing filter {directives:?}: {err}"))
        })?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    if TRACING_INITIALIZED.get().is_some() {
        return Ok(());
    }
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        tracing::debug!(error = %error, "Tracing subscriber already initialized");
    }
    let _ = TRACING_INITIALIZED.set(());
    Ok(())
}
