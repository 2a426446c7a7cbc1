use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;

use datafusion::arrow::array::Int64Array;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::catalog::TableProvider;
use datafusion::datasource::MemTable;
use datafusion::execution::context::SessionContext;
use datafusion::execution::TaskContextProvider;
use datafusion_ffi::execution::FFI_TaskContextProvider;
use datafusion_ffi::table_provider::FFI_TableProvider;
use delta_provider_bridge_py::{
    install_tracing, DataFusionUnavailableError, ImportlibVersionProbe, PyDeltaTableProvider,
};
use deltalake::{ensure_table_uri, DeltaTable};
use pyo3::exceptions::{PyKeyError, PyOSError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;
use tokio::runtime::Runtime;
use pyo3::types::{PyCapsule, PyCapsuleMethods, PyDict, PyModule, PyString, PyTuple};

const HELPERS: &CStr = c"
from importlib.metadata import PackageNotFoundError


class VersionScript:
    def __init__(self, *answers):
        self.answers = list(answers)
        self.calls = 0

    def __call__(self, package):
        assert package == 'datafusion'
        answer = self.answers[min(self.calls, len(self.answers) - 1)]
        self.calls += 1
        if answer is None:
            raise PackageNotFoundError(package)
        return answer


class CapsuleSession:
    def __init__(self, capsule):
        self.capsule = capsule

    def __datafusion_task_context_provider__(self):
        return self.capsule


class RaisingSession:
    def __datafusion_task_context_provider__(self):
        raise KeyError('session closed')


class NotACapsuleSession:
    def __datafusion_task_context_provider__(self):
        return 42


def unreadable_metadata(package):
    raise OSError('metadata index unreadable')
";

fn helpers(py: Python<'_>) -> Bound<'_, PyModule> {
    PyModule::from_code(py, HELPERS, c"bridge_helpers.py", c"bridge_helpers")
        .expect("helper module")
}

fn id_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])
        .expect("record batch")
}

fn sample_table() -> PyDeltaTableProvider {
    let batch = id_batch();
    let provider: Arc<dyn TableProvider> =
        Arc::new(MemTable::try_new(batch.schema(), vec![vec![batch]]).expect("mem table"));
    PyDeltaTableProvider::from_provider("memory://ids", provider)
}

fn write_delta_table(dir: &Path) -> String {
    let table_uri = dir.to_str().expect("utf-8 path").to_string();
    let table_url = ensure_table_uri(&table_uri).expect("table url");
    Runtime::new()
        .expect("tokio runtime")
        .block_on(async {
            DeltaTable::try_from_url(table_url)
                .await?
                .write(vec![id_batch()])
                .await
        })
        .expect("write delta table");
    table_uri
}

extern "C" fn foreign_library_marker() -> usize {
    usize::MAX
}

/// Import a table-provider capsule as a foreign library would and count its rows.
fn count_rows_through_ffi(capsule: &Bound<'_, PyCapsule>) -> usize {
    let mut ffi_provider = unsafe { capsule.reference::<FFI_TableProvider>() }.clone();
    ffi_provider.library_marker_id = foreign_library_marker;
    let provider = Arc::<dyn TableProvider>::from(&ffi_provider);

    let reader = SessionContext::new();
    reader.register_table("t", provider).expect("register table");
    let runtime = Runtime::new().expect("tokio runtime");
    let batches = runtime
        .block_on(async { reader.sql("SELECT * FROM t").await?.collect().await })
        .expect("query exported table");
    batches.iter().map(RecordBatch::num_rows).sum()
}

fn version_script<'py>(
    py: Python<'py>,
    answers: &[Option<&str>],
) -> (Bound<'py, PyAny>, ImportlibVersionProbe) {
    let answers: Vec<Py<PyAny>> = answers
        .iter()
        .map(|answer| match answer {
            Some(version) => PyString::new(py, version).into_any().unbind(),
            None => py.None(),
        })
        .collect();
    let script = helpers(py)
        .getattr("VersionScript")
        .expect("VersionScript")
        .call1(PyTuple::new(py, answers).expect("answers"))
        .expect("script");
    let probe = ImportlibVersionProbe::with_lookup(script.clone().unbind());
    (script, probe)
}

fn calls(script: &Bound<'_, PyAny>) -> usize {
    script
        .getattr("calls")
        .expect("calls")
        .extract()
        .expect("calls count")
}

fn message(py: Python<'_>, err: &PyErr) -> String {
    err.value(py).to_string()
}

#[test]
fn not_installed_raises_runtime_error() {
    Python::initialize();
    Python::attach(|py| {
        let (script, probe) = version_script(py, &[None]);
        let err = sample_table()
            .export_capsule(py, probe, None)
            .expect_err("datafusion absent");
        assert!(err.is_instance_of::<PyRuntimeError>(py));
        assert!(err.is_instance_of::<DataFusionUnavailableError>(py));
        assert_eq!(calls(&script), 1);
        let msg = message(py, &err);
        assert!(msg.contains("datafusion"));
        assert!(msg.to_lowercase().contains("not installed"));
        assert!(msg.contains("QueryBuilder"));
    });
}

#[test]
fn incompatible_version_raises_then_upgrade_succeeds() {
    Python::initialize();
    Python::attach(|py| {
        let (script, probe) = version_script(py, &[Some("51.0.0"), Some("52.0.0")]);
        let table = sample_table();
        let err = table
            .export_capsule(py, probe, None)
            .expect_err("51 is too old");
        assert!(err.is_instance_of::<PyRuntimeError>(py));
        assert_eq!(calls(&script), 1);
        let msg = message(py, &err);
        assert!(msg.contains("datafusion==52"));
        assert!(msg.contains("QueryBuilder"));

        let probe = ImportlibVersionProbe::with_lookup(script.clone().unbind());
        let capsule = table
            .export_capsule(py, probe, None)
            .expect("52 is supported");
        assert_eq!(calls(&script), 2);
        let name = capsule.name().expect("capsule name").expect("named capsule");
        assert_eq!(name, c"datafusion_table_provider");
    });
}

#[test]
fn plain_session_object_is_accepted() {
    Python::initialize();
    Python::attach(|py| {
        let (_, probe) = version_script(py, &[Some("52.0.0")]);
        let session = py
            .import("builtins")
            .and_then(|builtins| builtins.getattr("object"))
            .and_then(|object| object.call0())
            .expect("object()");
        let capsule = sample_table()
            .export_capsule(py, probe, Some(session))
            .expect("session without capability");
        assert!(capsule.name().expect("capsule name").is_some());
    });
}

#[test]
fn wrong_task_context_capsule_name_raises_value_error() {
    Python::initialize();
    Python::attach(|py| {
        let (_, probe) = version_script(py, &[Some("52.0.0")]);
        let bad_capsule = PyCapsule::new(
            py,
            1_usize,
            Some(CString::new("wrong_name").expect("capsule name")),
        )
        .expect("capsule");
        let session = helpers(py)
            .getattr("CapsuleSession")
            .and_then(|cls| cls.call1((bad_capsule,)))
            .expect("session");
        let err = sample_table()
            .export_capsule(py, probe, Some(session))
            .expect_err("wrong capsule name");
        assert!(err.is_instance_of::<PyValueError>(py));
        let msg = message(py, &err);
        assert!(msg.contains("Expected PyCapsule name"));
        assert!(msg.contains("datafusion_task_context_provider"));
        assert!(msg.contains("wrong_name"));
    });
}

#[test]
fn valid_task_context_capsule_is_accepted() {
    Python::initialize();
    let session_ctx = Arc::new(SessionContext::new());
    Python::attach(|py| {
        let (_, probe) = version_script(py, &[Some("52.0.0")]);
        let task_ctx_provider = Arc::clone(&session_ctx) as Arc<dyn TaskContextProvider>;
        let ffi_provider = FFI_TaskContextProvider::from(&task_ctx_provider);
        let capsule = PyCapsule::new(
            py,
            ffi_provider,
            Some(CString::new("datafusion_task_context_provider").expect("capsule name")),
        )
        .expect("capsule");
        let session = helpers(py)
            .getattr("CapsuleSession")
            .and_then(|cls| cls.call1((capsule,)))
            .expect("session");
        sample_table()
            .export_capsule(py, probe, Some(session))
            .expect("matching capsule");
    });
}

#[test]
fn session_errors_propagate_unchanged() {
    Python::initialize();
    Python::attach(|py| {
        let module = helpers(py);

        let (_, probe) = version_script(py, &[Some("52.0.0")]);
        let raising = module
            .getattr("RaisingSession")
            .and_then(|cls| cls.call0())
            .expect("session");
        let err = sample_table()
            .export_capsule(py, probe, Some(raising))
            .expect_err("session raises");
        assert!(err.is_instance_of::<PyKeyError>(py));

        let (_, probe) = version_script(py, &[Some("52.0.0")]);
        let not_capsule = module
            .getattr("NotACapsuleSession")
            .and_then(|cls| cls.call0())
            .expect("session");
        let err = sample_table()
            .export_capsule(py, probe, Some(not_capsule))
            .expect_err("not a capsule");
        assert!(err.is_instance_of::<PyTypeError>(py));
    });
}

#[test]
fn export_hook_reads_importlib_metadata_on_every_call() {
    Python::initialize();
    Python::attach(|py| {
        let metadata = py.import("importlib.metadata").expect("importlib.metadata");
        let original = metadata.getattr("version").expect("version function");
        let (script, _) = version_script(py, &[Some("51.0.0"), Some("52.0.0")]);
        metadata.setattr("version", &script).expect("patch version");

        let table = Bound::new(py, sample_table()).expect("table object");
        let first = table.call_method0("__datafusion_table_provider__");
        let kwargs = PyDict::new(py);
        kwargs
            .set_item("session", py.None())
            .expect("session kwarg");
        let second = table.call_method("__datafusion_table_provider__", (), Some(&kwargs));

        metadata.setattr("version", original).expect("restore version");

        let err = first.expect_err("51 is too old");
        assert!(err.is_instance_of::<PyRuntimeError>(py));
        assert!(message(py, &err).contains("datafusion==52"));
        second.expect("upgrade observed");
        assert_eq!(calls(&script), 2);
    });
}

#[test]
fn delta_table_is_loaded_and_exported() {
    Python::initialize();
    let dir = tempfile::tempdir().expect("temp dir");
    let table_uri = write_delta_table(dir.path());
    Python::attach(|py| {
        let table = py
            .get_type::<PyDeltaTableProvider>()
            .call1((table_uri.as_str(),))
            .expect("open delta table");
        let uri: String = table
            .getattr("table_uri")
            .and_then(|uri| uri.extract())
            .expect("table_uri");
        assert_eq!(uri, table_uri);

        let (_, probe) = version_script(py, &[Some("52.0.0")]);
        let capsule = table
            .downcast::<PyDeltaTableProvider>()
            .expect("DeltaTableProvider")
            .get()
            .export_capsule(py, probe, None)
            .expect("export delta table");
        let name = capsule.name().expect("capsule name").expect("named capsule");
        assert_eq!(name, c"datafusion_table_provider");
        assert_eq!(count_rows_through_ffi(&capsule), 3);
    });
}

#[test]
fn delta_table_rejects_version_with_timestamp() {
    Python::initialize();
    let dir = tempfile::tempdir().expect("temp dir");
    let table_uri = write_delta_table(dir.path());
    Python::attach(|py| {
        let err = py
            .get_type::<PyDeltaTableProvider>()
            .call1((table_uri.as_str(), py.None(), 0, "2020-01-01"))
            .expect_err("version and timestamp together");
        assert!(err.is_instance_of::<PyRuntimeError>(py));
        assert!(message(py, &err)
            .to_lowercase()
            .contains("specify either version or timestamp"));
    });
}

#[test]
fn version_lookup_failure_keeps_original_cause() {
    Python::initialize();
    Python::attach(|py| {
        let lookup = helpers(py)
            .getattr("unreadable_metadata")
            .expect("unreadable_metadata");
        let probe = ImportlibVersionProbe::with_lookup(lookup.unbind());
        let err = sample_table()
            .export_capsule(py, probe, None)
            .expect_err("lookup fails");
        assert!(err.is_instance_of::<PyRuntimeError>(py));
        assert!(!err.is_instance_of::<DataFusionUnavailableError>(py));
        assert!(message(py, &err).contains("datafusion"));

        let cause = err.cause(py).expect("original exception as cause");
        assert!(cause.is_instance_of::<PyOSError>(py));
        assert!(message(py, &cause).contains("metadata index unreadable"));
    });
}

#[test]
fn install_tracing_installs_once_and_rejects_bad_filters() {
    Python::initialize();
    Python::attach(|py| {
        let install = wrap_pyfunction!(install_tracing, py).expect("install_tracing");

        let err = install
            .call1(("delta_provider_bridge=loud",))
            .expect_err("invalid level");
        assert!(err.is_instance_of::<PyValueError>(py));
        assert!(message(py, &err).contains("Invalid tracing filter"));

        install.call0().expect("first install");
        assert!(tracing::dispatcher::has_been_set());
        install.call1(("debug",)).expect("second install is a no-op");

        let err = install
            .call1(("delta_provider_bridge=loud",))
            .expect_err("still validated after install");
        assert!(err.is_instance_of::<PyValueError>(py));
    });
}
