use std::cmp::Ordering;

use serde::Serialize;

use crate::arch::Platform;
use crate::error::{ErrorReport, NormalizeError};
use crate::legacy::{LegacyHeader, MaxCeVersion, MinCeVersion};

/// A Windows CE version number.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CeVersion {
    major: u32,
    minor: u32,
    string_value: String,
}

impl CeVersion {
    /// Creates a version.  The display string is documentation only and is
    /// never compared.
    pub fn new<S: Into<String>>(major: u32, minor: u32, string_value: S) -> Self {
        CeVersion { major, minor, string_value: string_value.into() }
    }

    /// Returns the major version number.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Returns the minor version number.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Returns the human-readable rendering of this version.
    pub fn string_value(&self) -> &str {
        &self.string_value
    }

    fn number(&self) -> (u32, u32) {
        (self.major, self.minor)
    }
}

impl From<&MinCeVersion> for CeVersion {
    fn from(version: &MinCeVersion) -> CeVersion {
        CeVersion::new(
            version.min_ce_version_major,
            version.min_ce_version_minor,
            version.min_ce_version_string.clone(),
        )
    }
}

impl From<&MaxCeVersion> for CeVersion {
    fn from(version: &MaxCeVersion) -> CeVersion {
        CeVersion::new(
            version.max_ce_version_major,
            version.max_ce_version_minor,
            version.max_ce_version_string.clone(),
        )
    }
}

/// The range of OS versions and builds a cabinet installs on.  Every bound
/// is optional.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    min_ce_version: Option<CeVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_ce_version: Option<CeVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_ce_build_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_ce_build_number: Option<u32>,
}

impl VersionConstraint {
    /// Validates and builds a constraint.  Fails if the minimum bound is
    /// above the maximum under (major, minor, build) ordering.  Build numbers
    /// only break ties: they are compared when the versions are equal or
    /// when either version is absent.
    pub fn new(
        min: Option<CeVersion>,
        max: Option<CeVersion>,
        min_build: Option<u32>,
        max_build: Option<u32>,
    ) -> Result<VersionConstraint, NormalizeError> {
        let constraint = VersionConstraint {
            min_ce_version: min,
            max_ce_version: max,
            min_ce_build_number: min_build,
            max_ce_build_number: max_build,
        };
        if constraint.is_inverted() {
            return Err(NormalizeError::MalformedVersionRange {
                min: render_bound(
                    constraint.min_ce_version.as_ref(),
                    min_build,
                ),
                max: render_bound(
                    constraint.max_ce_version.as_ref(),
                    max_build,
                ),
            });
        }
        Ok(constraint)
    }

    /// Returns the minimum version, if any.
    pub fn min_version(&self) -> Option<&CeVersion> {
        self.min_ce_version.as_ref()
    }

    /// Returns the maximum version, if any.
    pub fn max_version(&self) -> Option<&CeVersion> {
        self.max_ce_version.as_ref()
    }

    /// Returns the minimum build number, if any.
    pub fn min_build(&self) -> Option<u32> {
        self.min_ce_build_number
    }

    /// Returns the maximum build number, if any.
    pub fn max_build(&self) -> Option<u32> {
        self.max_ce_build_number
    }

    /// Returns true if a device running the given version and build falls
    /// inside this constraint.
    pub fn admits(&self, major: u32, minor: u32, build: u32) -> bool {
        let number = (major, minor);
        let above_min = match &self.min_ce_version {
            Some(min) => match number.cmp(&min.number()) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => {
                    self.min_ce_build_number.map_or(true, |b| build >= b)
                }
            },
            None => self.min_ce_build_number.map_or(true, |b| build >= b),
        };
        let below_max = match &self.max_ce_version {
            Some(max) => match number.cmp(&max.number()) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => {
                    self.max_ce_build_number.map_or(true, |b| build <= b)
                }
            },
            None => self.max_ce_build_number.map_or(true, |b| build <= b),
        };
        above_min && below_max
    }

    fn is_inverted(&self) -> bool {
        let builds_inverted = matches!(
            (self.min_ce_build_number, self.max_ce_build_number),
            (Some(lo), Some(hi)) if lo > hi
        );
        match (&self.min_ce_version, &self.max_ce_version) {
            (Some(min), Some(max)) => match min.number().cmp(&max.number()) {
                Ordering::Greater => true,
                Ordering::Equal => builds_inverted,
                Ordering::Less => false,
            },
            _ => builds_inverted,
        }
    }
}

fn render_bound(version: Option<&CeVersion>, build: Option<u32>) -> String {
    match (version, build) {
        (Some(v), Some(b)) => format!("{}.{} build {}", v.major, v.minor, b),
        (Some(v), None) => format!("{}.{}", v.major, v.minor),
        (None, Some(b)) => format!("build {}", b),
        (None, None) => "(none)".to_string(),
    }
}

/// The validated install gate of a header: its version range and the
/// platforms it refuses to install on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstallGate {
    pub(crate) versions: VersionConstraint,
    pub(crate) unsupported: Option<Vec<Platform>>,
}

impl InstallGate {
    /// Returns the version range.
    pub fn versions(&self) -> &VersionConstraint {
        &self.versions
    }

    /// Returns the unsupported platforms, if the header lists any.
    pub fn unsupported(&self) -> Option<&[Platform]> {
        self.unsupported.as_deref()
    }
}

/// Looks up unsupported-platform names.  Unknown names are reported and
/// left out of the result.
pub fn resolve_platforms<S: AsRef<str>>(
    names: &[S],
) -> Result<Vec<Platform>, ErrorReport> {
    let mut errors = Vec::new();
    let platforms = collect_platforms(names, &mut errors);
    ErrorReport::into_result(errors, platforms)
}

fn collect_platforms<S: AsRef<str>>(
    names: &[S],
    errors: &mut Vec<NormalizeError>,
) -> Vec<Platform> {
    let mut platforms = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        match Platform::from_name(name.trim()) {
            Some(platform) => platforms.push(platform),
            None => errors.push(NormalizeError::UnknownPlatformIdentifier(
                name.to_string(),
            )),
        }
    }
    platforms
}

/// Validates the version range and unsupported-platform list of a header.
pub fn resolve_gate(header: &LegacyHeader) -> Result<InstallGate, ErrorReport> {
    let mut errors = Vec::new();
    let gate = collect_gate(header, &mut errors);
    ErrorReport::into_result(errors, gate)
}

pub(crate) fn collect_gate(
    header: &LegacyHeader,
    errors: &mut Vec<NormalizeError>,
) -> InstallGate {
    let versions = VersionConstraint::new(
        header.min_ce_version.as_ref().map(CeVersion::from),
        header.max_ce_version.as_ref().map(CeVersion::from),
        header.min_ce_build_number,
        header.max_ce_build_number,
    )
    .unwrap_or_else(|error| {
        errors.push(error);
        VersionConstraint::default()
    });
    let unsupported = header
        .unsupported
        .as_ref()
        .map(|names| collect_platforms(names, errors));
    InstallGate { versions, unsupported }
}
