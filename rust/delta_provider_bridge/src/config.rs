//! Export-bridge configuration.

use serde::Deserialize;

use crate::errors::{BridgeError, BridgeResult};
use crate::version::ENGINE_PACKAGE;

/// Oldest DataFusion major whose FFI table-provider layout this bridge speaks.
pub const MIN_SUPPORTED_ENGINE_MAJOR: u16 = 52;

/// Query path that works without the external engine.
pub const DEFAULT_ALTERNATIVE_QUERY_PATH: &str = "deltalake.QueryBuilder";

const FILTER_PUSHDOWN_ENV: &str = "DELTALAKE_DATAFUSION_FILTER_PUSHDOWN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub engine_package: String,
    pub min_engine_major: u16,
    pub alternative_query_path: String,
    pub filter_pushdown: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine_package: ENGINE_PACKAGE.to_string(),
            min_engine_major: MIN_SUPPORTED_ENGINE_MAJOR,
            alternative_query_path: DEFAULT_ALTERNATIVE_QUERY_PATH.to_string(),
            filter_pushdown: true,
        }
    }
}

fn parse_env_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl BridgeConfig {
    /// Defaults overlaid with `DELTALAKE_DATAFUSION_FILTER_PUSHDOWN`.
    pub fn from_env() -> Self {
        Self::from_env_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_env_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(FILTER_PUSHDOWN_ENV).as_deref().and_then(parse_env_bool) {
            config.filter_pushdown = value;
        }
        config
    }

    pub fn from_json(payload: &str) -> BridgeResult<Self> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|err| BridgeError::Config(format!("Invalid bridge config JSON: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.engine_package.trim().is_empty() {
            return Err(BridgeError::Config(
                "engine_package must not be empty".to_string(),
            ));
        }
        if self.min_engine_major < MIN_SUPPORTED_ENGINE_MAJOR {
            return Err(BridgeError::Config(format!(
                "min_engine_major {actual} is below the supported floor {floor}",
                actual = self.min_engine_major,
                floor = MIN_SUPPORTED_ENGINE_MAJOR,
            )));
        }
        Ok(())
    }
}
