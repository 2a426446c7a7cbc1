//! Compatibility gate for the external engine.

use crate::config::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult};
use crate::version::EngineVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityVerdict {
    Absent,
    /// Holds the reported version string, which may be unparsable.
    Incompatible(String),
    Compatible(EngineVersion),
}

/// Classify a probe result against the minimum supported major version.
pub fn classify(installed: Option<&str>, min_major: u16) -> CompatibilityVerdict {
    let Some(raw) = installed else {
        return CompatibilityVerdict::Absent;
    };
    match EngineVersion::parse(raw) {
        Ok(version) if version.major >= min_major => CompatibilityVerdict::Compatible(version),
        Ok(_) | Err(_) => CompatibilityVerdict::Incompatible(raw.to_string()),
    }
}

/// Turn a verdict into the accepted version or a user-actionable error.
pub fn ensure_compatible(
    verdict: CompatibilityVerdict,
    config: &BridgeConfig,
) -> BridgeResult<EngineVersion> {
    match verdict {
        CompatibilityVerdict::Compatible(version) => Ok(version),
        CompatibilityVerdict::Absent => Err(BridgeError::EngineNotInstalled {
            package: config.engine_package.clone(),
            min_major: config.min_engine_major,
            alternative: config.alternative_query_path.clone(),
        }),
        CompatibilityVerdict::Incompatible(found) => Err(BridgeError::EngineVersionIncompatible {
            package: config.engine_package.clone(),
            found,
            min_major: config.min_engine_major,
            alternative: config.alternative_query_path.clone(),
        }),
    }
}
