//! Optional task-context capability offered by the caller's session.

use std::sync::Arc;

use datafusion::execution::context::SessionContext;
use datafusion::execution::TaskContextProvider;
use datafusion_ffi::execution::FFI_TaskContextProvider;

use crate::capsule::{OpaqueHandle, TASK_CONTEXT_PROVIDER_CAPSULE_NAME};
use crate::errors::{BridgeError, BridgeResult, CapabilityError};

/// A caller-supplied session argument.
///
/// The single capability is optional: the default implementation reports
/// that the argument offers no task context.
pub trait SessionArgument {
    /// `None` when the capability is not exposed, otherwise the result of
    /// invoking it. Errors belong to the caller and are passed through.
    fn task_context_provider(&self) -> Option<Result<OpaqueHandle, CapabilityError>> {
        None
    }
}

/// Session argument without the capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTaskContext;

impl SessionArgument for NoTaskContext {}

impl SessionArgument for Arc<SessionContext> {
    fn task_context_provider(&self) -> Option<Result<OpaqueHandle, CapabilityError>> {
        let provider = Arc::clone(self) as Arc<dyn TaskContextProvider>;
        let ffi_provider = FFI_TaskContextProvider::from(&provider);
        Some(
            OpaqueHandle::new(TASK_CONTEXT_PROVIDER_CAPSULE_NAME, ffi_provider)
                .map_err(CapabilityError::from),
        )
    }
}

/// Resolve the caller's task context, if one is offered.
///
/// The handle is validated before its payload is read, and the provider is
/// cloned out so the caller's handle is released when this returns.
pub fn extract_task_context(
    session: Option<&dyn SessionArgument>,
) -> BridgeResult<Option<FFI_TaskContextProvider>> {
    let Some(session) = session else {
        return Ok(None);
    };
    let Some(handle) = session.task_context_provider() else {
        return Ok(None);
    };
    let handle = handle.map_err(BridgeError::Capability)?;
    let provider = unsafe {
        handle.validated_reference::<FFI_TaskContextProvider>(TASK_CONTEXT_PROVIDER_CAPSULE_NAME)
    }?;
    Ok(Some(provider.clone()))
}
