//! Installed-engine version discovery.
//!
//! A probe answers one question: which version of a named package is
//! installed, if any. It must not initialize the engine or create sessions.

use std::fmt;

use crate::errors::CapabilityError;

/// Name of the external query engine package.
pub const ENGINE_PACKAGE: &str = "datafusion";

pub fn parse_major(version: &str) -> Result<u16, String> {
    EngineVersion::parse(version).map(|version| version.major)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl EngineVersion {
    /// Parse `MAJOR[.MINOR[.PATCH]]`, tolerating a pre-release or local
    /// suffix on the trailing component (`52.0.0rc1`, `52.1.0+local`).
    pub fn parse(version: &str) -> Result<Self, String> {
        let trimmed = version.trim();
        let mut parts = trimmed.splitn(3, '.');
        let major = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or_else(|| format!("Invalid version string {version:?}"))?
            .parse::<u16>()
            .map_err(|err| format!("Invalid version string {version:?}: {err}"))?;
        let minor = parts.next().map(leading_number).transpose()?.unwrap_or(0);
        let patch = parts.next().map(leading_number).transpose()?.unwrap_or(0);
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

fn leading_number(component: &str) -> Result<u16, String> {
    let digits: &str = component
        .find(|ch: char| !ch.is_ascii_digit())
        .map_or(component, |end| &component[..end]);
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse::<u16>()
        .map_err(|err| format!("Invalid version component {component:?}: {err}"))
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Package metadata lookup.
///
/// `Ok(None)` means the package is not installed. Errors are reserved for
/// lookups that failed for any other reason. Implementations must answer
/// from the live environment on every call.
pub trait VersionProbe {
    fn installed_version(&self, package: &str) -> Result<Option<String>, CapabilityError>;
}

impl<F> VersionProbe for F
where
    F: Fn(&str) -> Result<Option<String>, CapabilityError>,
{
    fn installed_version(&self, package: &str) -> Result<Option<String>, CapabilityError> {
        self(package)
    }
}

/// Reports the DataFusion version linked into this process.
///
/// Used by Rust hosts that embed DataFusion directly rather than loading
/// it as a separately installed package.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedVersionProbe;

impl VersionProbe for LinkedVersionProbe {
    fn installed_version(&self, package: &str) -> Result<Option<String>, CapabilityError> {
        if package == ENGINE_PACKAGE {
            Ok(Some(datafusion::DATAFUSION_VERSION.to_string()))
        } else {
            Ok(None)
        }
    }
}
