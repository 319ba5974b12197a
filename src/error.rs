use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::arch::ArchitectureVariant;
use crate::file::FlagPair;

/// One violated invariant found while normalizing a setup header.
#[derive(Clone, Debug, Error, Hash, Eq, PartialEq)]
pub enum NormalizeError {
    /// The minimum version gate is above the maximum version gate.
    #[error("minimum version {min} is above maximum version {max}")]
    MalformedVersionRange {
        /// The minimum bound, rendered as `major.minor` plus any build.
        min: String,
        /// The maximum bound, rendered as `major.minor` plus any build.
        max: String,
    },

    /// An unsupported-platform entry names no known platform.
    #[error("unknown platform identifier {0:?}")]
    UnknownPlatformIdentifier(String),

    /// A directory reference names a token that has no path on the target
    /// device class.
    #[error("directory alias {token:?} is not defined for {variant}")]
    UnsupportedDirectoryAliasForArchitecture {
        /// The directory reference as written in the header.
        token: String,
        /// The device class the header was normalized for.
        variant: ArchitectureVariant,
    },

    /// A file sets both flags of a mutually exclusive pair.
    #[error("file {file_id} sets conflicting flags {pair}")]
    ConflictingFileFlags {
        /// The offending file id.
        file_id: u16,
        /// Which exclusive pair is violated.
        pair: FlagPair,
    },

    /// Two files share the same id.
    #[error("duplicate file id {0}")]
    DuplicateFileId(u16),

    /// A file refers to a directory the alias resolver never saw.  This
    /// indicates a bug in the pipeline rather than bad input.
    #[error("file {file_id} refers to unresolved directory {token:?}")]
    UnresolvedDirectoryReference {
        /// The offending file id.
        file_id: u16,
        /// The directory reference as written in the header.
        token: String,
    },

    /// A registry value's type discriminator does not match its data.
    #[error(
        "invalid registry value #{index} under {hive}\\{}: {detail}",
        key_name(.key)
    )]
    InvalidRegistryValueShape {
        /// The hive path the value was declared under.
        hive: String,
        /// The key name, or `None` for the hive's default value.
        key: Option<String>,
        /// Zero-based position of the value within its key.
        index: usize,
        /// What is wrong with the value.
        detail: String,
    },

    /// A link points at a file or directory that does not exist.
    #[error(
        "link {link_id} points at a missing {}",
        target_kind(.is_file)
    )]
    DanglingLinkTarget {
        /// The id assigned to the offending link.
        link_id: u32,
        /// Whether the link targets a file (as opposed to a directory).
        is_file: bool,
    },
}

fn key_name(key: &Option<String>) -> &str {
    key.as_deref().unwrap_or(crate::consts::DEFAULT_KEY_NAME)
}

fn target_kind(is_file: &bool) -> &'static str {
    if *is_file {
        "file"
    } else {
        "directory"
    }
}

/// Every invariant violated by one setup header, in the order found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorReport {
    errors: Vec<NormalizeError>,
}

impl ErrorReport {
    /// Builds a report from a list of errors, dropping repeats while keeping
    /// the first occurrence of each.
    pub fn new(errors: Vec<NormalizeError>) -> ErrorReport {
        let mut seen = HashSet::with_capacity(errors.len());
        let errors = errors
            .into_iter()
            .filter(|error| seen.insert(error.clone()))
            .collect();
        ErrorReport { errors }
    }

    /// Returns the errors in this report.
    pub fn errors(&self) -> &[NormalizeError] {
        &self.errors
    }

    /// Returns the number of errors in this report.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if the report holds no errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true if any error indicates a bug in the normalizer itself
    /// rather than bad input.
    pub fn has_internal_errors(&self) -> bool {
        self.errors.iter().any(|error| {
            matches!(error, NormalizeError::UnresolvedDirectoryReference { .. })
        })
    }

    pub(crate) fn into_result<T>(
        errors: Vec<NormalizeError>,
        value: T,
    ) -> Result<T, ErrorReport> {
        if errors.is_empty() {
            Ok(value)
        } else {
            Err(ErrorReport::new(errors))
        }
    }
}

impl IntoIterator for ErrorReport {
    type Item = NormalizeError;
    type IntoIter = std::vec::IntoIter<NormalizeError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) in setup header", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorReport {}

#[cfg(test)]
mod tests {
    use super::{ErrorReport, NormalizeError};
    use crate::arch::ArchitectureVariant;
    use crate::file::FlagPair;

    #[test]
    fn report_drops_repeats_in_order() {
        let report = ErrorReport::new(vec![
            NormalizeError::DuplicateFileId(3),
            NormalizeError::UnknownPlatformIdentifier("X".to_string()),
            NormalizeError::DuplicateFileId(3),
            NormalizeError::DuplicateFileId(1),
        ]);
        assert_eq!(
            report.errors(),
            &[
                NormalizeError::DuplicateFileId(3),
                NormalizeError::UnknownPlatformIdentifier("X".to_string()),
                NormalizeError::DuplicateFileId(1),
            ]
        );
        assert!(!report.has_internal_errors());
    }

    #[test]
    fn error_messages() {
        let error = NormalizeError::UnsupportedDirectoryAliasForArchitecture {
            token: "%CE3%".to_string(),
            variant: ArchitectureVariant::PalmSize,
        };
        assert_eq!(
            error.to_string(),
            "directory alias \"%CE3%\" is not defined for palm-size"
        );
        let error = NormalizeError::ConflictingFileFlags {
            file_id: 1,
            pair: FlagPair::FileDate,
        };
        assert_eq!(
            error.to_string(),
            "file 1 sets conflicting flags \
             ignoreCabFileDate/doNotOverWriteIfTargetIsNewer"
        );
        let error = NormalizeError::InvalidRegistryValueShape {
            hive: "HKLM".to_string(),
            key: None,
            index: 2,
            detail: "bad".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid registry value #2 under HKLM\\@: bad"
        );
        let error = NormalizeError::DanglingLinkTarget {
            link_id: 4,
            is_file: false,
        };
        assert_eq!(error.to_string(), "link 4 points at a missing directory");
    }
}
