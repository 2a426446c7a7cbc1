//! Python bindings exposing Delta tables to datafusion-python through the
//! `__datafusion_table_provider__` protocol.

use pyo3::prelude::*;

pub mod errors;
pub mod probe;
mod runtime;
mod session;
pub mod table;
mod tracing_setup;

pub use errors::DataFusionUnavailableError;
pub use probe::ImportlibVersionProbe;
pub use table::PyDeltaTableProvider;
pub use tracing_setup::install_tracing;

#[pymodule]
fn delta_provider_bridge_py(module: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = module.py();
    module.add_class::<PyDeltaTableProvider>()?;
    module.add(
        "DataFusionUnavailableError",
        py.get_type::<DataFusionUnavailableError>(),
    )?;
    module.add_function(wrap_pyfunction!(tracing_setup::install_tracing, module)?)?;
    Ok(())
}
