//! Tagged, type-erased handles passed across the FFI boundary.
//!
//! A handle's payload may only be reinterpreted after its identity tag has
//! been checked against the single tag expected for that negotiation.

use std::ffi::{c_void, CStr, CString};
use std::fmt;
use std::ptr::NonNull;

use crate::errors::{BridgeError, BridgeResult};

/// Tag carried by the foreign task-context provider handle.
pub const TASK_CONTEXT_PROVIDER_CAPSULE_NAME: &str = "datafusion_task_context_provider";

/// Tag carried by the exported table-provider handle.
pub const TABLE_PROVIDER_CAPSULE_NAME: &str = "datafusion_table_provider";

pub type ReleaseFn = unsafe extern "C" fn(payload: *mut c_void);

pub fn capsule_name(name: &str) -> BridgeResult<CString> {
    CString::new(name).map_err(|err| BridgeError::Config(format!("Invalid capsule name: {err}")))
}

/// Compare a handle tag with the expected protocol tag by exact equality.
pub fn validate_identity(tag: Option<&CStr>, expected: &str) -> BridgeResult<()> {
    match tag {
        Some(tag) if tag.to_bytes() == expected.as_bytes() => Ok(()),
        other => Err(BridgeError::InvalidCapsuleIdentity {
            expected: expected.to_string(),
            actual: other.map(|tag| tag.to_string_lossy().into_owned()),
        }),
    }
}

pub struct OpaqueHandle {
    name: Option<CString>,
    payload: NonNull<c_void>,
    release: Option<ReleaseFn>,
}

unsafe extern "C" fn release_boxed<T>(payload: *mut c_void) {
    drop(unsafe { Box::from_raw(payload.cast::<T>()) });
}

impl OpaqueHandle {
    /// Box `value` behind a handle tagged `name`; the value is dropped with the handle.
    pub fn new<T: 'static>(name: &str, value: T) -> BridgeResult<Self> {
        let name = capsule_name(name)?;
        let payload = NonNull::from(Box::leak(Box::new(value))).cast::<c_void>();
        Ok(Self {
            name: Some(name),
            payload,
            release: Some(release_boxed::<T>),
        })
    }

    /// Wrap a foreign payload.
    ///
    /// # Safety
    /// `payload` must stay valid until the handle is dropped, and `release`,
    /// when given, must be safe to call exactly once with `payload`.
    pub unsafe fn from_raw(
        name: Option<CString>,
        payload: NonNull<c_void>,
        release: Option<ReleaseFn>,
    ) -> Self {
        Self {
            name,
            payload,
            release,
        }
    }

    pub fn name(&self) -> Option<&CStr> {
        self.name.as_deref()
    }

    pub fn validate(&self, expected: &str) -> BridgeResult<()> {
        validate_identity(self.name(), expected)
    }

    /// Borrow the payload as `T` once the tag matches `expected`.
    ///
    /// # Safety
    /// Every handle tagged `expected` must point at a live `T`.
    pub unsafe fn validated_reference<T>(&self, expected: &str) -> BridgeResult<&T> {
        self.validate(expected)?;
        Ok(unsafe { self.payload.cast::<T>().as_ref() })
    }
}

impl Drop for OpaqueHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            unsafe { release(self.payload.as_ptr()) };
        }
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueHandle")
            .field("name", &self.name)
            .field("owned", &self.release.is_some())
            .finish_non_exhaustive()
    }
}
