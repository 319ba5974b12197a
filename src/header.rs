use std::num::NonZeroUsize;
use std::panic;
use std::thread;

use serde::Serialize;
use tracing::{debug, error};

use crate::alias::{Directory, DirectoryResolver};
use crate::arch::{Architecture, ArchitectureVariant, Platform};
use crate::error::ErrorReport;
use crate::file::{self, FileDirective};
use crate::legacy::LegacyHeader;
use crate::link::{self, Link};
use crate::registry::{self, RegistryEntry};
use crate::version::{self, VersionConstraint};

/// A fully resolved and validated setup header.
///
/// Instances only come out of a [`Normalizer`]; there is no way to modify
/// one afterwards.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupHeader {
    app_name: String,
    provider: String,
    architecture: Option<Architecture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unsupported: Option<Vec<Platform>>,
    #[serde(flatten)]
    versions: VersionConstraint,
    directories: Vec<Directory>,
    files: Vec<FileDirective>,
    registry_entries: Vec<RegistryEntry>,
    links: Vec<Link>,
}

impl SetupHeader {
    /// Returns the application name.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the application provider.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the CPU family the cabinet was built for, if known.
    pub fn architecture(&self) -> Option<Architecture> {
        self.architecture
    }

    /// Returns the platforms the cabinet refuses to install on, if the
    /// header listed any.
    pub fn unsupported(&self) -> Option<&[Platform]> {
        self.unsupported.as_deref()
    }

    /// Returns the OS version gate.
    pub fn versions(&self) -> &VersionConstraint {
        &self.versions
    }

    /// Returns the directories, ordered by id.
    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    /// Returns the files to install, in declaration order.
    pub fn files(&self) -> &[FileDirective] {
        &self.files
    }

    /// Returns the flattened registry entries.
    pub fn registry_entries(&self) -> &[RegistryEntry] {
        &self.registry_entries
    }

    /// Returns the links, ordered by id.
    pub fn links(&self) -> &[Link] {
        &self.links
    }
}

/// Converts legacy setup headers into canonical ones for one device class.
///
/// # Example
///
/// ```
/// use cab000::{ArchitectureVariant, LegacyFile, LegacyHeader, Normalizer};
///
/// let mut header = LegacyHeader::default();
/// header.app_name = "Solitaire".to_string();
/// header.files.push(LegacyFile::new(1, "sol.exe", "%CE1%\\Games"));
/// let setup = Normalizer::new(ArchitectureVariant::PocketPc)
///     .normalize(&header)
///     .unwrap();
/// assert_eq!(setup.directories()[0].path(), "\\Program Files\\Games");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Normalizer {
    variant: ArchitectureVariant,
    architecture: Option<Architecture>,
}

impl Normalizer {
    /// Creates a normalizer for the given device class, with no CPU
    /// architecture recorded in its output.
    pub fn new(variant: ArchitectureVariant) -> Normalizer {
        Normalizer { variant, architecture: None }
    }

    /// Sets the CPU architecture recorded in every header this normalizer
    /// produces.
    pub fn architecture(
        mut self,
        architecture: Option<Architecture>,
    ) -> Normalizer {
        self.architecture = architecture;
        self
    }

    /// Returns the device class whose directory aliases are used.
    pub fn variant(&self) -> ArchitectureVariant {
        self.variant
    }

    /// Normalizes one header.  Every step runs even when an earlier one
    /// fails, so the returned report lists every problem with the header.
    pub fn normalize(
        &self,
        header: &LegacyHeader,
    ) -> Result<SetupHeader, ErrorReport> {
        let mut errors = Vec::new();
        let gate = version::collect_gate(header, &mut errors);
        let references = header
            .files
            .iter()
            .map(|file| file.directory.as_str())
            .chain(
                header
                    .links
                    .iter()
                    .filter(|link| !link.is_file)
                    .filter_map(|link| link.target_token.as_deref()),
            );
        let directories =
            DirectoryResolver::new(self.variant).collect(references, &mut errors);
        let files =
            file::collect_files(&header.files, &directories, &mut errors);
        let registry_entries =
            registry::collect_registry(&header.registry_entries, &mut errors);
        let links = link::collect_links(
            &header.links,
            &directories,
            &files,
            &mut errors,
        );
        if !errors.is_empty() {
            let report = ErrorReport::new(errors);
            if report.has_internal_errors() {
                error!(
                    app = %header.app_name,
                    "Directory resolution missed a file reference"
                );
            }
            debug!(
                app = %header.app_name,
                errors = report.len(),
                "Rejected setup header"
            );
            return Err(report);
        }
        let setup = SetupHeader {
            app_name: header.app_name.clone(),
            provider: header.provider.clone(),
            architecture: self.architecture,
            unsupported: gate.unsupported,
            versions: gate.versions,
            directories: directories.into_directories(),
            files: files.into_directives(),
            registry_entries,
            links,
        };
        debug!(
            app = %setup.app_name,
            directories = setup.directories.len(),
            files = setup.files.len(),
            registry_entries = setup.registry_entries.len(),
            links = setup.links.len(),
            "Normalized setup header"
        );
        Ok(setup)
    }

    /// Normalizes many independent headers on worker threads.  Results are
    /// returned in input order.
    pub fn normalize_batch(
        &self,
        headers: &[LegacyHeader],
    ) -> Vec<Result<SetupHeader, ErrorReport>> {
        if headers.is_empty() {
            return Vec::new();
        }
        let workers =
            thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let chunk_size = headers.len().div_ceil(workers);
        debug!(headers = headers.len(), workers, "Normalizing batch");
        thread::scope(|scope| {
            let handles: Vec<_> = headers
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|header| self.normalize(header))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| panic::resume_unwind(payload))
                })
                .collect()
        })
    }
}
