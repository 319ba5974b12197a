use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize, Serializer};
use tracing::trace;

use crate::alias::{DirectoryLookup, DirectoryTable};
use crate::consts;
use crate::error::{ErrorReport, NormalizeError};
use crate::legacy::LegacyFile;

bitflags! {
    /// The installation behavior flags of a file, laid out as in the flag
    /// word of a `.000` FILES entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FileFlags: u32 {
        /// Warn the user if the file is skipped.
        const WARN_IF_SKIPPED = consts::FILE_WARN_IF_SKIPPED;
        /// Do not allow the user to skip the file.
        const DO_NOT_SKIP = consts::FILE_DO_NOT_SKIP;
        /// Overwrite the target if it exists.
        const OVERWRITE_TARGET_IF_EXISTS = consts::FILE_OVERWRITE_TARGET_IF_EXISTS;
        /// Only copy the file if the target already exists.
        const DO_NOT_COPY_UNLESS_TARGET_EXISTS =
            consts::FILE_DO_NOT_COPY_UNLESS_TARGET_EXISTS;
        /// Self-register the file (a DLL) after installing it.
        const SELF_REGISTER_DLL = consts::FILE_SELF_REGISTER_DLL;
        /// Keep the target if it is newer than the file.
        const DO_NOT_OVERWRITE_IF_TARGET_IS_NEWER =
            consts::FILE_DO_NOT_OVERWRITE_IF_TARGET_IS_NEWER;
        /// Ignore the file's date when deciding whether to overwrite.
        const IGNORE_CAB_FILE_DATE = consts::FILE_IGNORE_CAB_FILE_DATE;
        /// The file is shared and reference counted.
        const REFERENCE_COUNTING_SHARED = consts::FILE_REFERENCE_COUNTING_SHARED;
    }
}

impl FileFlags {
    /// Returns the mutually exclusive pairs of which both flags are set.
    pub fn conflicts(self) -> impl Iterator<Item = FlagPair> {
        FlagPair::ALL
            .into_iter()
            .filter(move |pair| self.contains(pair.flags()))
    }
}

/// A pair of file flags that may not both be set.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum FlagPair {
    /// `ignoreCabFileDate` and `doNotOverWriteIfTargetIsNewer`.
    FileDate,
    /// `doNotCopyUnlessTargetExists` and `overWriteTargetIfExists`.
    TargetExistence,
}

impl FlagPair {
    /// Both exclusive pairs.
    pub const ALL: [FlagPair; 2] = [FlagPair::FileDate, FlagPair::TargetExistence];

    /// Returns the two flags of this pair.
    pub fn flags(self) -> FileFlags {
        match self {
            FlagPair::FileDate => {
                FileFlags::IGNORE_CAB_FILE_DATE
                    | FileFlags::DO_NOT_OVERWRITE_IF_TARGET_IS_NEWER
            }
            FlagPair::TargetExistence => {
                FileFlags::DO_NOT_COPY_UNLESS_TARGET_EXISTS
                    | FileFlags::OVERWRITE_TARGET_IF_EXISTS
            }
        }
    }
}

impl fmt::Display for FlagPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlagPair::FileDate => {
                "ignoreCabFileDate/doNotOverWriteIfTargetIsNewer"
            }
            FlagPair::TargetExistence => {
                "doNotCopyUnlessTargetExists/overWriteTargetIfExists"
            }
        })
    }
}

/// The file flags spelled as the eight named booleans of the JSON shapes.
/// Absent fields are false.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileFlagFields {
    /// See [`FileFlags::REFERENCE_COUNTING_SHARED`].
    pub is_reference_counting_shared_file: bool,
    /// See [`FileFlags::IGNORE_CAB_FILE_DATE`].
    pub ignore_cab_file_date: bool,
    /// See [`FileFlags::DO_NOT_OVERWRITE_IF_TARGET_IS_NEWER`].
    pub do_not_over_write_if_target_is_newer: bool,
    /// See [`FileFlags::SELF_REGISTER_DLL`].
    pub self_register_dll: bool,
    /// See [`FileFlags::DO_NOT_COPY_UNLESS_TARGET_EXISTS`].
    pub do_not_copy_unless_target_exists: bool,
    /// See [`FileFlags::OVERWRITE_TARGET_IF_EXISTS`].
    pub over_write_target_if_exists: bool,
    /// See [`FileFlags::DO_NOT_SKIP`].
    pub do_not_skip: bool,
    /// See [`FileFlags::WARN_IF_SKIPPED`].
    pub warn_if_skipped: bool,
}

impl From<FileFlagFields> for FileFlags {
    fn from(fields: FileFlagFields) -> FileFlags {
        let mut flags = FileFlags::empty();
        flags.set(
            FileFlags::REFERENCE_COUNTING_SHARED,
            fields.is_reference_counting_shared_file,
        );
        flags.set(FileFlags::IGNORE_CAB_FILE_DATE, fields.ignore_cab_file_date);
        flags.set(
            FileFlags::DO_NOT_OVERWRITE_IF_TARGET_IS_NEWER,
            fields.do_not_over_write_if_target_is_newer,
        );
        flags.set(FileFlags::SELF_REGISTER_DLL, fields.self_register_dll);
        flags.set(
            FileFlags::DO_NOT_COPY_UNLESS_TARGET_EXISTS,
            fields.do_not_copy_unless_target_exists,
        );
        flags.set(
            FileFlags::OVERWRITE_TARGET_IF_EXISTS,
            fields.over_write_target_if_exists,
        );
        flags.set(FileFlags::DO_NOT_SKIP, fields.do_not_skip);
        flags.set(FileFlags::WARN_IF_SKIPPED, fields.warn_if_skipped);
        flags
    }
}

impl From<FileFlags> for FileFlagFields {
    fn from(flags: FileFlags) -> FileFlagFields {
        FileFlagFields {
            is_reference_counting_shared_file: flags
                .contains(FileFlags::REFERENCE_COUNTING_SHARED),
            ignore_cab_file_date: flags.contains(FileFlags::IGNORE_CAB_FILE_DATE),
            do_not_over_write_if_target_is_newer: flags
                .contains(FileFlags::DO_NOT_OVERWRITE_IF_TARGET_IS_NEWER),
            self_register_dll: flags.contains(FileFlags::SELF_REGISTER_DLL),
            do_not_copy_unless_target_exists: flags
                .contains(FileFlags::DO_NOT_COPY_UNLESS_TARGET_EXISTS),
            over_write_target_if_exists: flags
                .contains(FileFlags::OVERWRITE_TARGET_IF_EXISTS),
            do_not_skip: flags.contains(FileFlags::DO_NOT_SKIP),
            warn_if_skipped: flags.contains(FileFlags::WARN_IF_SKIPPED),
        }
    }
}

// ========================================================================= //

/// One file to install, with its directory given by id.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct FileDirective {
    id: u16,
    name: String,
    directory_id: u32,
    flags: FileFlags,
}

impl FileDirective {
    /// Returns the file's id, unique within its header.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the name the file is installed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the id of the directory the file is installed into.
    pub fn directory_id(&self) -> u32 {
        self.directory_id
    }

    /// Returns the file's installation behavior flags.
    pub fn flags(&self) -> FileFlags {
        self.flags
    }
}

impl Serialize for FileDirective {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Repr<'a> {
            id: u16,
            name: &'a str,
            directory_id: u32,
            #[serde(flatten)]
            flags: FileFlagFields,
        }

        Repr {
            id: self.id,
            name: &self.name,
            directory_id: self.directory_id,
            flags: FileFlagFields::from(self.flags),
        }
        .serialize(serializer)
    }
}

/// The normalized files of one header.
#[derive(Clone, Debug, Default)]
pub struct FileTable {
    directives: Vec<FileDirective>,
    declared: BTreeSet<u16>,
}

impl FileTable {
    /// Returns the accepted files, in input order.
    pub fn directives(&self) -> &[FileDirective] {
        &self.directives
    }

    /// Returns true if the input declared a file with this id, whether or
    /// not that file was accepted.
    pub fn is_declared(&self, id: u16) -> bool {
        self.declared.contains(&id)
    }

    pub(crate) fn into_directives(self) -> Vec<FileDirective> {
        self.directives
    }
}

/// Normalizes a header's files against its resolved directories.  Files
/// whose directory reference was rejected by the resolver are dropped
/// without a second error.
pub fn normalize_files(
    files: &[LegacyFile],
    directories: &DirectoryTable,
) -> Result<FileTable, ErrorReport> {
    let mut errors = Vec::new();
    let table = collect_files(files, directories, &mut errors);
    ErrorReport::into_result(errors, table)
}

pub(crate) fn collect_files(
    files: &[LegacyFile],
    directories: &DirectoryTable,
    errors: &mut Vec<NormalizeError>,
) -> FileTable {
    let mut table = FileTable::default();
    for file in files {
        let mut accepted = true;
        if !table.declared.insert(file.file_id) {
            errors.push(NormalizeError::DuplicateFileId(file.file_id));
            accepted = false;
        }
        let flags = FileFlags::from(file.flags);
        for pair in flags.conflicts() {
            errors.push(NormalizeError::ConflictingFileFlags {
                file_id: file.file_id,
                pair,
            });
            accepted = false;
        }
        let directory_id = match directories.lookup(&file.directory) {
            DirectoryLookup::Resolved(id) => Some(id),
            DirectoryLookup::Rejected => None,
            DirectoryLookup::Unknown => {
                errors.push(NormalizeError::UnresolvedDirectoryReference {
                    file_id: file.file_id,
                    token: file.directory.clone(),
                });
                None
            }
        };
        match directory_id {
            Some(directory_id) if accepted => {
                trace!(id = file.file_id, directory_id, "Accepted file");
                table.directives.push(FileDirective {
                    id: file.file_id,
                    name: file.name.clone(),
                    directory_id,
                    flags,
                });
            }
            _ => {}
        }
    }
    table
}

// ========================================================================= //
