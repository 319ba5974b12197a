//! A library for reading and normalizing the setup headers of [Windows
//! CE](https://en.wikipedia.org/wiki/Windows_Embedded_Compact) application
//! cabinets.
//!
//! A setup header (the `.000` file inside an installation cabinet) says
//! which OS versions an application installs on, which files go into which
//! well-known directories, what to write to the registry and which
//! shortcuts to create.  This crate decodes the binary `.000` format into a
//! [`LegacyHeader`], and converts a [`LegacyHeader`] into a fully resolved,
//! validated [`SetupHeader`] for one device class.

#![warn(missing_docs)]

#[macro_use]
mod macros;

mod alias;
mod arch;
mod consts;
mod error;
mod file;
mod header;
mod legacy;
mod link;
mod reader;
mod registry;
mod string;
mod version;

pub use crate::alias::{
    Directory, DirectoryLookup, DirectoryResolver, DirectoryTable,
    DirectoryToken,
};
pub use crate::arch::{Architecture, ArchitectureVariant, Platform};
pub use crate::error::{ErrorReport, NormalizeError};
pub use crate::file::{
    normalize_files, FileDirective, FileFlagFields, FileFlags, FileTable,
    FlagPair,
};
pub use crate::header::{Normalizer, SetupHeader};
pub use crate::legacy::{
    LegacyFile, LegacyHeader, LegacyHive, LegacyKeys, LegacyLink,
    LegacyValue, LegacyValueData, MaxCeVersion, MinCeVersion,
    UnrecognizedData,
};
pub use crate::link::{build_links, Link};
pub use crate::reader::Cab000Reader;
pub use crate::registry::{
    flatten_registry, RegistryDataType, RegistryEntry, RegistryValue,
};
pub use crate::version::{
    resolve_gate, resolve_platforms, CeVersion, InstallGate,
    VersionConstraint,
};
