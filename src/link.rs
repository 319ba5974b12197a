use serde::Serialize;
use tracing::trace;

use crate::alias::{DirectoryLookup, DirectoryTable};
use crate::error::{ErrorReport, NormalizeError};
use crate::file::FileTable;
use crate::legacy::LegacyLink;

/// A shortcut pointing at a file or directory by id.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    link_id: u32,
    is_file: bool,
    target_id: u32,
    link_path: String,
    target_path: String,
}

impl Link {
    /// Returns this link's id, assigned from 1 in input order.
    pub fn link_id(&self) -> u32 {
        self.link_id
    }

    /// Returns true if the link targets a file, false for a directory.
    pub fn is_file(&self) -> bool {
        self.is_file
    }

    /// Returns the id of the file or directory the link points at.
    pub fn target_id(&self) -> u32 {
        self.target_id
    }

    /// Returns where the shortcut itself is created.
    pub fn link_path(&self) -> &str {
        &self.link_path
    }

    /// Returns where the shortcut points.
    pub fn target_path(&self) -> &str {
        &self.target_path
    }
}

enum Target {
    Found(u32),
    Rejected,
    Dangling,
}

fn find_target(
    link: &LegacyLink,
    directories: &DirectoryTable,
    files: &FileTable,
) -> Target {
    if link.is_file {
        return match link.target_id.and_then(|id| u16::try_from(id).ok()) {
            Some(id) if files.is_declared(id) => Target::Found(u32::from(id)),
            _ => Target::Dangling,
        };
    }
    if let Some(token) = link.target_token.as_deref() {
        return match directories.lookup(token) {
            DirectoryLookup::Resolved(id) => Target::Found(id),
            DirectoryLookup::Rejected => Target::Rejected,
            DirectoryLookup::Unknown => Target::Dangling,
        };
    }
    match link.target_id {
        Some(id) if directories.contains_id(id) => Target::Found(id),
        _ => Target::Dangling,
    }
}

/// Builds the link table, checking every target against the header's
/// directories and files.  Links whose target directory was already
/// rejected by the resolver are dropped without a second error.  A link
/// created under a `%CEn%` token the device class leaves undefined is
/// rejected the same way a file in that directory would be.
pub fn build_links(
    links: &[LegacyLink],
    directories: &DirectoryTable,
    files: &FileTable,
) -> Result<Vec<Link>, ErrorReport> {
    let mut errors = Vec::new();
    let links = collect_links(links, directories, files, &mut errors);
    ErrorReport::into_result(errors, links)
}

pub(crate) fn collect_links(
    links: &[LegacyLink],
    directories: &DirectoryTable,
    files: &FileTable,
    errors: &mut Vec<NormalizeError>,
) -> Vec<Link> {
    let mut built = Vec::with_capacity(links.len());
    for (link_id, link) in (1..).zip(links) {
        let location = directories.undefined_token(&link.link_path);
        if let Some(token) = location {
            errors.push(
                NormalizeError::UnsupportedDirectoryAliasForArchitecture {
                    token: token.to_string(),
                    variant: directories.variant(),
                },
            );
        }
        match find_target(link, directories, files) {
            Target::Found(_) if location.is_some() => {}
            Target::Found(target_id) => {
                trace!(link_id, target_id, is_file = link.is_file, "Built link");
                built.push(Link {
                    link_id,
                    is_file: link.is_file,
                    target_id,
                    link_path: link.link_path.clone(),
                    target_path: link.target_path.clone(),
                });
            }
            Target::Rejected => {}
            Target::Dangling => {
                errors.push(NormalizeError::DanglingLinkTarget {
                    link_id,
                    is_file: link.is_file,
                });
            }
        }
    }
    built
}
