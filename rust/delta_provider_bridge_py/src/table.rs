//! Python-visible Delta table provider with the DataFusion export hook.

use std::collections::HashMap;
use std::sync::Arc;

use datafusion::catalog::TableProvider;
use delta_provider_bridge::capsule::capsule_name;
use delta_provider_bridge::{
    BridgeConfig, SessionArgument, TableProviderExport, VersionProbe,
    TABLE_PROVIDER_CAPSULE_NAME,
};
use deltalake::delta_datafusion::{DeltaScanConfig, DeltaTableProvider};
use deltalake::errors::DeltaTableError;
use deltalake::{ensure_table_uri, DeltaTableBuilder};
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::PyCapsule;
use tracing::instrument;

use crate::errors::bridge_error_to_py;
use crate::probe::ImportlibVersionProbe;
use crate::runtime::{runtime_handle, shared_runtime};
use crate::session::PySessionArgument;

fn open_table_builder(
    table_uri: &str,
    storage_options: Option<HashMap<String, String>>,
    version: Option<i64>,
    timestamp: Option<String>,
) -> Result<DeltaTableBuilder, DeltaTableError> {
    if let (Some(version), Some(timestamp)) = (version, timestamp.as_deref()) {
        return Err(DeltaTableError::Generic(format!(
            "Cannot open {table_uri:?} at version {version} and timestamp {timestamp:?}; \
             specify either version or timestamp"
        )));
    }
    let mut builder = DeltaTableBuilder::from_url(ensure_table_uri(table_uri)?)?;
    builder = match (version, timestamp) {
        (Some(version), _) => builder.with_version(version),
        (None, Some(timestamp)) => builder.with_datestring(timestamp)?,
        (None, None) => builder,
    };
    Ok(match storage_options {
        Some(options) => builder.with_storage_options(options),
        None => builder,
    })
}

async fn load_delta_provider(
    table_uri: &str,
    storage_options: Option<HashMap<String, String>>,
    version: Option<i64>,
    timestamp: Option<String>,
) -> Result<DeltaTableProvider, DeltaTableError> {
    let table = open_table_builder(table_uri, storage_options, version, timestamp)?
        .load()
        .await?;
    let eager_snapshot = table.snapshot()?.snapshot().clone();
    let log_store = table.log_store();
    DeltaTableProvider::try_new(eager_snapshot, log_store, DeltaScanConfig::new())
}

/// A Delta table that datafusion-python can register through
/// `SessionContext.register_table`.
#[pyclass(name = "DeltaTableProvider", module = "delta_provider_bridge_py", frozen)]
pub struct PyDeltaTableProvider {
    provider: Arc<dyn TableProvider>,
    table_uri: String,
}

impl PyDeltaTableProvider {
    /// Wrap an already-built provider; used by hosts that resolve tables themselves.
    pub fn from_provider(table_uri: impl Into<String>, provider: Arc<dyn TableProvider>) -> Self {
        Self {
            provider,
            table_uri: table_uri.into(),
        }
    }

    /// Run the export hook with `probe` and wrap the result in a PyCapsule.
    #[instrument(level = "debug", skip_all, fields(table_uri = %self.table_uri))]
    pub fn export_capsule<'py, P: VersionProbe>(
        &self,
        py: Python<'py>,
        probe: P,
        session: Option<Bound<'py, PyAny>>,
    ) -> PyResult<Bound<'py, PyCapsule>> {
        let export = TableProviderExport::with_config(probe, BridgeConfig::from_env())
            .map_err(|err| bridge_error_to_py(py, err))?
            .with_runtime(runtime_handle()?);
        let session = session.map(PySessionArgument::new);
        let handle = export
            .export(
                Arc::clone(&self.provider),
                session.as_ref().map(|session| session as &dyn SessionArgument),
            )
            .map_err(|err| bridge_error_to_py(py, err))?;
        let name = capsule_name(TABLE_PROVIDER_CAPSULE_NAME)
            .map_err(|err| bridge_error_to_py(py, err))?;
        PyCapsule::new(py, handle.into_ffi(), Some(name))
    }
}

#[pymethods]
impl PyDeltaTableProvider {
    #[new]
    #[pyo3(signature = (table_uri, storage_options = None, version = None, timestamp = None))]
    fn new(
        table_uri: String,
        storage_options: Option<HashMap<String, String>>,
        version: Option<i64>,
        timestamp: Option<String>,
    ) -> PyResult<Self> {
        let provider = shared_runtime()?
            .block_on(load_delta_provider(
                &table_uri,
                storage_options,
                version,
                timestamp,
            ))
            .map_err(|err| {
                PyRuntimeError::new_err(format!("Failed to load Delta table {table_uri:?}: {err}"))
            })?;
        tracing::debug!(table_uri = %table_uri, "Loaded Delta table provider");
        Ok(Self::from_provider(table_uri, Arc::new(provider)))
    }

    #[getter]
    fn table_uri(&self) -> String {
        self.table_uri.clone()
    }

    /// Export this table for datafusion-python.
    ///
    /// DataFusion 52+ passes its session as `session`; when that object
    /// exposes `__datafusion_task_context_provider__` the returned capsule
    /// must be named `datafusion_task_context_provider`.
    #[pyo3(signature = (session = None))]
    fn __datafusion_table_provider__<'py>(
        &self,
        py: Python<'py>,
        session: Option<Bound<'py, PyAny>>,
    ) -> PyResult<Bound<'py, PyCapsule>> {
        self.export_capsule(py, ImportlibVersionProbe::default(), session)
    }

    fn __repr__(&self) -> String {
        format!("DeltaTableProvider(table_uri={:?})", self.table_uri)
    }
}
