//! Adapter exposing a Python session object as a [`SessionArgument`].

use std::cell::RefCell;
use std::ffi::CStr;
use std::ptr::NonNull;

use delta_provider_bridge::{CapabilityError, OpaqueHandle, SessionArgument};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyCapsule, PyCapsuleMethods};

pub(crate) const TASK_CONTEXT_PROVIDER_METHOD: &str = "__datafusion_task_context_provider__";

pub(crate) struct PySessionArgument<'py> {
    session: Bound<'py, PyAny>,
    // Keeps returned capsules alive while their payloads are borrowed.
    capsules: RefCell<Vec<Bound<'py, PyCapsule>>>,
}

impl<'py> PySessionArgument<'py> {
    pub(crate) fn new(session: Bound<'py, PyAny>) -> Self {
        Self {
            session,
            capsules: RefCell::new(Vec::new()),
        }
    }

    fn has_capability(&self) -> PyResult<bool> {
        self.session.hasattr(TASK_CONTEXT_PROVIDER_METHOD)
    }

    fn borrowed_handle(&self) -> PyResult<OpaqueHandle> {
        let returned = self.session.call_method0(TASK_CONTEXT_PROVIDER_METHOD)?;
        let capsule = returned.downcast_into::<PyCapsule>().map_err(PyErr::from)?;
        let name = capsule.name()?.map(CStr::to_owned);
        let payload = NonNull::new(capsule.pointer())
            .ok_or_else(|| PyValueError::new_err("Task context capsule holds a null pointer"))?;
        self.capsules.borrow_mut().push(capsule);
        // The capsule owns the payload; the handle only borrows it.
        Ok(unsafe { OpaqueHandle::from_raw(name, payload, None) })
    }
}

impl SessionArgument for PySessionArgument<'_> {
    fn task_context_provider(&self) -> Option<Result<OpaqueHandle, CapabilityError>> {
        match self.has_capability() {
            Ok(false) => None,
            Ok(true) => Some(
                self.borrowed_handle()
                    .map_err(|err| Box::new(err) as CapabilityError),
            ),
            Err(err) => Some(Err(Box::new(err))),
        }
    }
}
