use std::sync::{Arc, OnceLock};

use datafusion::execution::context::SessionContext;
use datafusion::execution::TaskContextProvider;
use datafusion_ffi::execution::FFI_TaskContextProvider;

/// Session backing providers exported without a caller-supplied context.
///
/// The FFI provider only keeps a weak reference to its session, so the
/// session lives for the rest of the process.
pub fn internal_task_ctx_provider() -> Arc<dyn TaskContextProvider> {
    static TASK_CTX_PROVIDER: OnceLock<Arc<SessionContext>> = OnceLock::new();
    let provider = TASK_CTX_PROVIDER.get_or_init(|| Arc::new(SessionContext::new()));
    Arc::clone(provider) as Arc<dyn TaskContextProvider>
}

pub(crate) fn internal_ffi_task_ctx_provider() -> FFI_TaskContextProvider {
    let provider = internal_task_ctx_provider();
    FFI_TaskContextProvider::from(&provider)
}
