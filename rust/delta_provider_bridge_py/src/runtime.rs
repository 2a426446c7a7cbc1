use std::sync::OnceLock;

use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use tokio::runtime::{Handle, Runtime};

static SHARED_RUNTIME: OnceLock<Runtime> = OnceLock::new();

pub(crate) fn shared_runtime() -> PyResult<&'static Runtime> {
    if let Some(runtime) = SHARED_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = Runtime::new()
        .map_err(|err| PyRuntimeError::new_err(format!("Failed to create Tokio runtime: {err}")))?;
    Ok(SHARED_RUNTIME.get_or_init(|| runtime))
}

pub(crate) fn runtime_handle() -> PyResult<Handle> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle),
        Err(_) => Ok(shared_runtime()?.handle().clone()),
    }
}
