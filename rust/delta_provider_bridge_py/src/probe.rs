//! `importlib.metadata` backed version probe.

use delta_provider_bridge::{CapabilityError, VersionProbe};
use pyo3::prelude::*;

/// Looks up installed package versions through `importlib.metadata`.
///
/// The lookup function is resolved on every call, so a replaced
/// `importlib.metadata.version` is honoured immediately.
#[derive(Default)]
pub struct ImportlibVersionProbe {
    lookup: Option<Py<PyAny>>,
}

impl ImportlibVersionProbe {
    /// Use `lookup(package) -> str` instead of `importlib.metadata.version`.
    pub fn with_lookup(lookup: Py<PyAny>) -> Self {
        Self {
            lookup: Some(lookup),
        }
    }

    fn lookup_version(&self, py: Python<'_>, package: &str) -> PyResult<Option<String>> {
        let metadata = py.import("importlib.metadata")?;
        let lookup = match &self.lookup {
            Some(lookup) => lookup.bind(py).clone(),
            None => metadata.getattr("version")?,
        };
        match lookup.call1((package,)) {
            Ok(version) => Ok(Some(version.extract::<String>()?)),
            Err(err) => {
                let not_found = metadata.getattr("PackageNotFoundError")?;
                if err.is_instance(py, &not_found) {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

impl VersionProbe for ImportlibVersionProbe {
    fn installed_version(&self, package: &str) -> Result<Option<String>, CapabilityError> {
        Python::attach(|py| self.lookup_version(py, package))
            .map_err(|err| Box::new(err) as CapabilityError)
    }
}
