use std::error::Error;

use datafusion::error::DataFusionError;
use thiserror::Error;

/// Error raised by a caller-supplied capability or version lookup.
pub type CapabilityError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(
        "The `{package}` package is not installed, so this table cannot be exported as a \
         DataFusion table provider. Install `{package}=={min_major}.*` or query the table \
         with `{alternative}` instead."
    )]
    EngineNotInstalled {
        package: String,
        min_major: u16,
        alternative: String,
    },
    #[error(
        "Installed `{package}` version {found} is incompatible with this table provider; \
         {package}>={min_major} is required (pip install '{package}=={min_major}.*'). \
         Upgrade `{package}` or query the table with `{alternative}` instead."
    )]
    EngineVersionIncompatible {
        package: String,
        found: String,
        min_major: u16,
        alternative: String,
    },
    #[error("Expected capsule name '{expected}', got {}", describe_tag(.actual.as_deref()))]
    InvalidCapsuleIdentity {
        expected: String,
        actual: Option<String>,
    },
    #[error("Failed to look up the installed version of `{package}`: {source}")]
    VersionLookup {
        package: String,
        #[source]
        source: CapabilityError,
    },
    #[error(transparent)]
    Capability(CapabilityError),
    #[error("Invalid bridge configuration: {0}")]
    Config(String),
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),
}

fn describe_tag(tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("'{tag}'"),
        None => "an unnamed capsule".to_string(),
    }
}

impl BridgeError {
    /// True for the two verdicts of the compatibility gate.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(
            self,
            BridgeError::EngineNotInstalled { .. } | BridgeError::EngineVersionIncompatible { .. }
        )
    }
}

impl From<BridgeError> for DataFusionError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::DataFusion(inner) => inner,
            BridgeError::Config(message) => DataFusionError::Configuration(message),
            other => DataFusionError::External(Box::new(other)),
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
