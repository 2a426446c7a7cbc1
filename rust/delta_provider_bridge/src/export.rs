//! Table-provider export hook.

use std::fmt;
use std::sync::Arc;

use datafusion::catalog::TableProvider;
use datafusion_ffi::table_provider::FFI_TableProvider;
use tokio::runtime::Handle;
use tracing::instrument;

use crate::capability::{extract_task_context, SessionArgument};
use crate::capsule::{OpaqueHandle, TABLE_PROVIDER_CAPSULE_NAME};
use crate::config::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult};
use crate::gate::{classify, ensure_compatible};
use crate::task_context::internal_ffi_task_ctx_provider;
use crate::version::{EngineVersion, VersionProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Task context taken from the caller's session.
    Caller,
    /// Task context from the bridge's own session.
    Internal,
}

/// Exported provider. Consuming it hands the FFI provider to the caller.
pub struct ProviderHandle {
    provider: FFI_TableProvider,
    engine_version: EngineVersion,
    context_source: ContextSource,
}

impl ProviderHandle {
    pub fn engine_version(&self) -> EngineVersion {
        self.engine_version
    }

    pub fn context_source(&self) -> ContextSource {
        self.context_source
    }

    pub fn into_ffi(self) -> FFI_TableProvider {
        self.provider
    }

    /// Wrap the provider in a handle tagged `datafusion_table_provider`.
    pub fn into_opaque(self) -> BridgeResult<OpaqueHandle> {
        OpaqueHandle::new(TABLE_PROVIDER_CAPSULE_NAME, self.provider)
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("engine_version", &self.engine_version)
            .field("context_source", &self.context_source)
            .finish_non_exhaustive()
    }
}

/// Export hook bound to a version probe and configuration.
///
/// Holds no per-call state; every call probes the engine version again.
pub struct TableProviderExport<P> {
    probe: P,
    config: BridgeConfig,
    runtime: Option<Handle>,
}

impl<P: VersionProbe> TableProviderExport<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            config: BridgeConfig::default(),
            runtime: None,
        }
    }

    pub fn with_config(probe: P, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        Ok(Self {
            probe,
            config,
            runtime: None,
        })
    }

    /// Runtime used by the exported provider for async scans.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Probe the installed engine once and gate on its version.
    pub fn check_engine(&self) -> BridgeResult<EngineVersion> {
        let package = self.config.engine_package.as_str();
        let installed = self
            .probe
            .installed_version(package)
            .map_err(|source| BridgeError::VersionLookup {
                package: package.to_string(),
                source,
            })?;
        let verdict = classify(installed.as_deref(), self.config.min_engine_major);
        tracing::debug!(package, ?verdict, "Engine compatibility verdict");
        ensure_compatible(verdict, &self.config)
    }

    /// Gate on the engine version, pick a task context and build the FFI provider.
    ///
    /// Without a caller context the provider is bound to a session shared by
    /// the whole process (see [`crate::task_context::internal_task_ctx_provider`]).
    #[instrument(
        level = "debug",
        skip_all,
        fields(package = %self.config.engine_package, with_session = session.is_some())
    )]
    pub fn export(
        &self,
        table: Arc<dyn TableProvider>,
        session: Option<&dyn SessionArgument>,
    ) -> BridgeResult<ProviderHandle> {
        let engine_version = self.check_engine()?;
        let (task_ctx_provider, context_source) = match extract_task_context(session)? {
            Some(provider) => (provider, ContextSource::Caller),
            None => (internal_ffi_task_ctx_provider(), ContextSource::Internal),
        };
        tracing::debug!(?context_source, %engine_version, "Exporting table provider");
        let provider = FFI_TableProvider::new(
            table,
            self.config.filter_pushdown,
            self.runtime.clone(),
            task_ctx_provider,
            None,
        );
        Ok(ProviderHandle {
            provider,
            engine_version,
            context_source,
        })
    }
}
