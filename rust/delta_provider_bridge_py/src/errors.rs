use delta_provider_bridge::BridgeError;
use pyo3::create_exception;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

create_exception!(
    delta_provider_bridge_py,
    DataFusionUnavailableError,
    PyRuntimeError,
    "The installed datafusion package is missing or too old for table provider export."
);

/// Map a bridge failure onto the Python exception the caller should see.
///
/// Errors raised by the caller's own session object are re-raised as they were.
pub(crate) fn bridge_error_to_py(py: Python<'_>, err: BridgeError) -> PyErr {
    match err {
        BridgeError::Capability(inner) => match inner.downcast::<PyErr>() {
            Ok(py_err) => *py_err,
            Err(other) => PyRuntimeError::new_err(other.to_string()),
        },
        BridgeError::InvalidCapsuleIdentity { expected, actual } => {
            let message = match actual {
                Some(actual) => {
                    format!("Expected PyCapsule name '{expected}', instead got '{actual}'")
                }
                None => format!("Expected PyCapsule name '{expected}', but the capsule has no name"),
            };
            PyValueError::new_err(message)
        }
        err @ (BridgeError::EngineNotInstalled { .. }
        | BridgeError::EngineVersionIncompatible { .. }) => {
            DataFusionUnavailableError::new_err(err.to_string())
        }
        BridgeError::VersionLookup { package, source } => {
            let py_err = PyRuntimeError::new_err(format!(
                "Failed to look up the installed version of `{package}`"
            ));
            match source.downcast::<PyErr>() {
                Ok(cause) => py_err.set_cause(py, Some(*cause)),
                Err(other) => {
                    return PyRuntimeError::new_err(format!(
                        "Failed to look up the installed version of `{package}`: {other}"
                    ))
                }
            }
            py_err
        }
        BridgeError::Config(message) => PyValueError::new_err(message),
        other @ BridgeError::DataFusion(_) => PyRuntimeError::new_err(other.to_string()),
    }
}
