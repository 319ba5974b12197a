use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::arch::ArchitectureVariant;
use crate::error::{ErrorReport, NormalizeError};

const NUM_TOKENS: usize = 17;

type AliasTable = [Option<&'static str>; NUM_TOKENS];

const HPC_TABLE: AliasTable = [
    Some("\\Program Files"),
    Some("\\Windows"),
    Some("\\Windows\\Desktop"),
    Some("\\Windows\\StartUp"),
    Some("\\My Documents"),
    Some("\\Program Files\\Accessories"),
    Some("\\Program Files\\Communications"),
    Some("\\Program Files\\Games"),
    Some("\\Program Files\\Pocket Outlook"),
    Some("\\Program Files\\Office"),
    Some("\\Windows\\Programs"),
    Some("\\Windows\\Programs\\Accessories"),
    Some("\\Windows\\Programs\\Communications"),
    Some("\\Windows\\Programs\\Games"),
    Some("\\Windows\\Fonts"),
    Some("\\Windows\\Recent"),
    Some("\\Windows\\Favorites"),
];

const PALM_SIZE_TABLE: AliasTable = [
    Some("\\Program Files"),
    Some("\\Windows"),
    None,
    Some("\\Windows\\StartUp"),
    Some("\\My Documents"),
    Some("\\Program Files\\Accessories"),
    Some("\\Program Files\\Communications"),
    Some("\\Program Files\\Games"),
    None,
    None,
    Some("\\Windows\\Start Menu\\Programs"),
    Some("\\Windows\\Start Menu\\Accessories"),
    Some("\\Windows\\Start Menu\\Communications"),
    Some("\\Windows\\Start Menu\\Games"),
    Some("\\Windows\\Fonts"),
    None,
    Some("\\Windows\\Start Menu"),
];

const POCKET_PC_TABLE: AliasTable = [
    Some("\\Program Files"),
    Some("\\Windows"),
    None,
    Some("\\Windows\\StartUp"),
    Some("\\My Documents"),
    None,
    None,
    None,
    None,
    None,
    Some("\\Windows\\Start Menu\\Programs"),
    None,
    None,
    Some("\\Windows\\Start Menu\\Games"),
    Some("\\Windows\\Fonts"),
    None,
    Some("\\Windows\\Start Menu"),
];

fn table_for(variant: ArchitectureVariant) -> &'static AliasTable {
    match variant {
        ArchitectureVariant::Hpc => &HPC_TABLE,
        ArchitectureVariant::PalmSize => &PALM_SIZE_TABLE,
        ArchitectureVariant::PocketPc => &POCKET_PC_TABLE,
    }
}

// ========================================================================= //

/// One of the well-known directory tokens, `%CE1%` through `%CE17%`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct DirectoryToken(u8);

impl DirectoryToken {
    /// Returns the token `%CEn%`, if `n` is between 1 and 17.
    pub fn new(n: u8) -> Option<DirectoryToken> {
        if (1..=NUM_TOKENS as u8).contains(&n) {
            Some(DirectoryToken(n))
        } else {
            None
        }
    }

    /// Returns an iterator over all tokens, in order.
    pub fn all() -> impl Iterator<Item = DirectoryToken> {
        (1..=NUM_TOKENS as u8).map(DirectoryToken)
    }

    /// Parses a bare token such as `%CE5%`.  The `CE` prefix is matched
    /// without regard to case.
    pub fn parse(text: &str) -> Option<DirectoryToken> {
        let inner = text.strip_prefix('%')?.strip_suffix('%')?;
        let prefix = inner.get(..2)?;
        if inner.len() < 3 || !prefix.eq_ignore_ascii_case("CE") {
            return None;
        }
        let digits = &inner[2..];
        if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        DirectoryToken::new(digits.parse().ok()?)
    }

    /// Returns the number `n` of this `%CEn%` token.
    pub fn number(self) -> u8 {
        self.0
    }

    /// Returns the device path this token stands for on the given device
    /// class, or `None` if the token is undefined there.
    pub fn path(self, variant: ArchitectureVariant) -> Option<&'static str> {
        table_for(variant)[(self.0 - 1) as usize]
    }
}

impl fmt::Display for DirectoryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%CE{}%", self.0)
    }
}

/// Splits a directory reference such as `%CE1%\App\Data` into its token and
/// the relative path after it.
fn split_reference(reference: &str) -> Option<(DirectoryToken, Option<&str>)> {
    let (head, rest) = match reference.find('\\') {
        Some(index) => (&reference[..index], &reference[index..]),
        None => (reference, ""),
    };
    let token = DirectoryToken::parse(head)?;
    let rest = rest.trim_matches('\\');
    Some((token, if rest.is_empty() { None } else { Some(rest) }))
}

/// Returns the spelling two references share when they name the same token
/// and relative path.
fn reference_key(reference: &str) -> String {
    match split_reference(reference) {
        Some((token, Some(relative))) => format!("{}\\{}", token, relative),
        Some((token, None)) => token.to_string(),
        None => reference.to_string(),
    }
}

// ========================================================================= //

/// A directory on the device, referenced by id from files and links.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
pub struct Directory {
    id: u32,
    path: String,
}

impl Directory {
    /// Returns this directory's id, unique within its header.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the absolute device path of this directory.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// The outcome of looking up a directory reference in a `DirectoryTable`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DirectoryLookup {
    /// The reference resolved to the directory with this id.
    Resolved(u32),
    /// The reference was seen but could not be resolved; the failure has
    /// already been reported.
    Rejected,
    /// The reference was never given to the resolver.
    Unknown,
}

/// The directories resolved for one header, with a lookup from reference
/// text to directory id.
#[derive(Clone, Debug)]
pub struct DirectoryTable {
    variant: ArchitectureVariant,
    directories: Vec<Directory>,
    ids: BTreeMap<String, u32>,
    rejected: BTreeSet<String>,
}

impl DirectoryTable {
    /// Returns the device class these directories were resolved for.
    pub fn variant(&self) -> ArchitectureVariant {
        self.variant
    }

    /// Returns the resolved directories, in first-reference order.
    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    /// Looks up a directory reference.
    pub fn lookup(&self, reference: &str) -> DirectoryLookup {
        let key = reference_key(reference);
        if let Some(&id) = self.ids.get(&key) {
            DirectoryLookup::Resolved(id)
        } else if self.rejected.contains(&key) {
            DirectoryLookup::Rejected
        } else {
            DirectoryLookup::Unknown
        }
    }

    /// Returns true if a directory with the given id exists.
    pub fn contains_id(&self, id: u32) -> bool {
        id >= 1 && (id as usize) <= self.directories.len()
    }

    /// Returns the leading token of `path` if this device class leaves it
    /// undefined.  Paths that don't start with a `%CEn%` token pass.
    pub(crate) fn undefined_token(
        &self,
        path: &str,
    ) -> Option<DirectoryToken> {
        let (token, _) = split_reference(path)?;
        match token.path(self.variant) {
            Some(_) => None,
            None => Some(token),
        }
    }

    pub(crate) fn into_directories(self) -> Vec<Directory> {
        self.directories
    }
}

/// Resolves symbolic directory references to device paths for one device
/// class.
#[derive(Clone, Copy, Debug)]
pub struct DirectoryResolver {
    variant: ArchitectureVariant,
}

impl DirectoryResolver {
    /// Creates a resolver using the alias table of the given device class.
    pub fn new(variant: ArchitectureVariant) -> DirectoryResolver {
        DirectoryResolver { variant }
    }

    /// Returns the device class this resolver uses.
    pub fn variant(&self) -> ArchitectureVariant {
        self.variant
    }

    /// Resolves each reference, assigning ids from 1 in first-reference
    /// order.  A reference seen again reuses its id.  Every reference whose
    /// token is undefined for this device class is reported.
    pub fn resolve<'a, I>(&self, references: I) -> Result<DirectoryTable, ErrorReport>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut errors = Vec::new();
        let table = self.collect(references, &mut errors);
        ErrorReport::into_result(errors, table)
    }

    pub(crate) fn collect<'a, I>(
        &self,
        references: I,
        errors: &mut Vec<NormalizeError>,
    ) -> DirectoryTable
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut table = DirectoryTable {
            variant: self.variant,
            directories: Vec::new(),
            ids: BTreeMap::new(),
            rejected: BTreeSet::new(),
        };
        for reference in references {
            let key = reference_key(reference);
            if table.ids.contains_key(&key) || table.rejected.contains(&key) {
                continue;
            }
            match self.resolve_path(reference) {
                Some(path) => {
                    let id = table.directories.len() as u32 + 1;
                    trace!(reference, id, path = %path, "Resolved directory");
                    table.ids.insert(key, id);
                    table.directories.push(Directory { id, path });
                }
                None => {
                    table.rejected.insert(key);
                    errors.push(
                        NormalizeError::UnsupportedDirectoryAliasForArchitecture {
                            token: reference.to_string(),
                            variant: self.variant,
                        },
                    );
                }
            }
        }
        table
    }

    fn resolve_path(&self, reference: &str) -> Option<String> {
        let (token, relative) = split_reference(reference)?;
        let base = token.path(self.variant)?;
        Some(match relative {
            Some(relative) => format!("{}\\{}", base, relative),
            None => base.to_string(),
        })
    }
}

// ========================================================================= //

#[cfg(test)]
mod tests {
    use super::{
        split_reference, DirectoryLookup, DirectoryResolver, DirectoryToken,
    };
    use crate::arch::ArchitectureVariant;
    use crate::error::NormalizeError;

    #[test]
    fn parse_tokens() {
        assert_eq!(DirectoryToken::parse("%CE1%"), DirectoryToken::new(1));
        assert_eq!(DirectoryToken::parse("%ce17%"), DirectoryToken::new(17));
        assert_eq!(DirectoryToken::parse("%CE0%"), None);
        assert_eq!(DirectoryToken::parse("%CE18%"), None);
        assert_eq!(DirectoryToken::parse("%CE05%"), None);
        assert_eq!(DirectoryToken::parse("%CE%"), None);
        assert_eq!(DirectoryToken::parse("%InstallDir%"), None);
        assert_eq!(DirectoryToken::parse("CE1"), None);
        for token in DirectoryToken::all() {
            assert_eq!(DirectoryToken::parse(&token.to_string()), Some(token));
        }
    }

    #[test]
    fn split_references() {
        let ce1 = DirectoryToken::new(1).unwrap();
        assert_eq!(split_reference("%CE1%"), Some((ce1, None)));
        assert_eq!(split_reference("%CE1%\\"), Some((ce1, None)));
        assert_eq!(
            split_reference("%CE1%\\My App\\Data"),
            Some((ce1, Some("My App\\Data")))
        );
        assert_eq!(split_reference("%InstallDir%\\x"), None);
        assert_eq!(split_reference("\\Windows"), None);
    }

    #[test]
    fn tables_match_known_gaps() {
        let undefined = |variant| {
            DirectoryToken::all()
                .filter(|token| token.path(variant).is_none())
                .map(|token| token.number())
                .collect::<Vec<u8>>()
        };
        assert_eq!(undefined(ArchitectureVariant::Hpc), Vec::<u8>::new());
        assert_eq!(
            undefined(ArchitectureVariant::PalmSize),
            vec![3, 9, 10, 16]
        );
        assert_eq!(
            undefined(ArchitectureVariant::PocketPc),
            vec![3, 6, 7, 8, 9, 10, 12, 13, 16]
        );
    }

    #[test]
    fn ids_follow_first_reference() {
        let resolver = DirectoryResolver::new(ArchitectureVariant::Hpc);
        let table = resolver
            .resolve(["%CE2%", "%CE1%", "%CE2%", "%CE1%\\App", "%CE1%"])
            .unwrap();
        let dirs: Vec<(u32, &str)> = table
            .directories()
            .iter()
            .map(|dir| (dir.id(), dir.path()))
            .collect();
        assert_eq!(
            dirs,
            vec![
                (1, "\\Windows"),
                (2, "\\Program Files"),
                (3, "\\Program Files\\App"),
            ]
        );
        assert_eq!(table.lookup("%CE1%"), DirectoryLookup::Resolved(2));
        assert_eq!(table.lookup("%CE5%"), DirectoryLookup::Unknown);
        assert!(table.contains_id(3));
        assert!(!table.contains_id(0));
        assert!(!table.contains_id(4));
    }

    #[test]
    fn same_token_reuses_id_regardless_of_spelling() {
        let resolver = DirectoryResolver::new(ArchitectureVariant::Hpc);
        let table = resolver
            .resolve(["%CE2%", "%ce2%", "%CE2%\\", "%CE1%\\App\\", "%Ce1%\\App"])
            .unwrap();
        assert_eq!(table.directories().len(), 2);
        assert_eq!(table.lookup("%ce2%"), DirectoryLookup::Resolved(1));
        assert_eq!(table.lookup("%CE1%\\App"), DirectoryLookup::Resolved(2));
    }

    #[test]
    fn same_path_different_token_gets_own_id() {
        let resolver = DirectoryResolver::new(ArchitectureVariant::PalmSize);
        let table = resolver.resolve(["%CE2%\\Fonts", "%CE15%"]).unwrap();
        assert_eq!(table.directories().len(), 2);
        assert_eq!(table.directories()[0].path(), "\\Windows\\Fonts");
        assert_eq!(table.directories()[1].path(), "\\Windows\\Fonts");
    }

    #[test]
    fn undefined_alias_is_rejected_once() {
        let resolver = DirectoryResolver::new(ArchitectureVariant::PalmSize);
        let mut errors = Vec::new();
        let table =
            resolver.collect(["%CE3%", "%CE1%", "%CE3%"], &mut errors);
        assert_eq!(
            errors,
            vec![NormalizeError::UnsupportedDirectoryAliasForArchitecture {
                token: "%CE3%".to_string(),
                variant: ArchitectureVariant::PalmSize,
            }]
        );
        assert_eq!(table.lookup("%CE3%"), DirectoryLookup::Rejected);
        assert_eq!(table.lookup("%CE1%"), DirectoryLookup::Resolved(1));
    }

    #[test]
    fn every_gap_is_rejected_and_every_entry_resolves_exactly() {
        for variant in ArchitectureVariant::ALL {
            let resolver = DirectoryResolver::new(variant);
            for token in DirectoryToken::all() {
                let reference = token.to_string();
                let result = resolver.resolve([reference.as_str()]);
                match token.path(variant) {
                    Some(path) => {
                        let table = result.unwrap();
                        assert_eq!(table.directories()[0].path(), path);
                    }
                    None => {
                        let report = result.unwrap_err();
                        assert_eq!(
                            report.errors(),
                            &[NormalizeError::UnsupportedDirectoryAliasForArchitecture {
                                token: reference.clone(),
                                variant,
                            }]
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn install_dir_is_not_an_alias() {
        let resolver = DirectoryResolver::new(ArchitectureVariant::Hpc);
        assert!(resolver.resolve(["%InstallDir%"]).is_err());
    }
}
