//! Export of DataFusion table providers across independently versioned
//! engine builds.
//!
//! The export hook probes the installed engine version, negotiates an
//! optional task context offered by the caller, validates the identity tag
//! of any foreign handle before reading it, and hands back an owned FFI
//! table provider.

pub mod capability;
pub mod capsule;
pub mod config;
pub mod errors;
pub mod export;
pub mod gate;
pub mod task_context;
pub mod version;

pub use capability::{extract_task_context, NoTaskContext, SessionArgument};
pub use capsule::{
    validate_identity, OpaqueHandle, TABLE_PROVIDER_CAPSULE_NAME,
    TASK_CONTEXT_PROVIDER_CAPSULE_NAME,
};
pub use config::{BridgeConfig, MIN_SUPPORTED_ENGINE_MAJOR};
pub use errors::{BridgeError, BridgeResult, CapabilityError};
pub use export::{ContextSource, ProviderHandle, TableProviderExport};
pub use gate::{classify, ensure_compatible, CompatibilityVerdict};
pub use version::{parse_major, EngineVersion, LinkedVersionProbe, VersionProbe, ENGINE_PACKAGE};
