use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use tracing::{debug, trace};

use crate::alias::DirectoryToken;
use crate::arch::Architecture;
use crate::consts;
use crate::file::{FileFlagFields, FileFlags};
use crate::legacy::{
    LegacyFile, LegacyHeader, LegacyHive, LegacyKeys, LegacyLink,
    LegacyValue, MaxCeVersion, MinCeVersion,
};
use crate::string::{
    decode_string, read_fixed_string, split_multi_string,
    split_null_terminated,
};

/// A decoded `.000` setup file: the binary header block stored as the first
/// file of a Windows CE installation cabinet.
#[derive(Clone, Debug)]
pub struct Cab000Reader {
    file_length: u32,
    architecture_id: u32,
    header: LegacyHeader,
}

struct Counts {
    strings: u16,
    dirs: u16,
    files: u16,
    hives: u16,
    keys: u16,
    links: u16,
}

struct Offsets {
    strings: u32,
    dirs: u32,
    files: u32,
    hives: u32,
    keys: u32,
    links: u32,
}

impl Cab000Reader {
    /// Decodes a `.000` setup file.
    pub fn new<R: Read + Seek>(mut reader: R) -> io::Result<Cab000Reader> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != consts::HEADER_SIGNATURE {
            invalid_data!("Not a setup file (invalid header signature)");
        }
        let _unknown1 = reader.read_u32::<LittleEndian>()?;
        let file_length = reader.read_u32::<LittleEndian>()?;
        if (file_length as u64) < consts::HEADER_SIZE {
            invalid_data!(
                "Setup file length field is too small ({} bytes)",
                file_length
            );
        }
        let _unknown2 = reader.read_u32::<LittleEndian>()?;
        let _unknown3 = reader.read_u32::<LittleEndian>()?;
        let architecture_id = reader.read_u32::<LittleEndian>()?;
        let min_major = reader.read_u32::<LittleEndian>()?;
        let min_minor = reader.read_u32::<LittleEndian>()?;
        let max_major = reader.read_u32::<LittleEndian>()?;
        let max_minor = reader.read_u32::<LittleEndian>()?;
        let min_build = reader.read_u32::<LittleEndian>()?;
        let max_build = reader.read_u32::<LittleEndian>()?;
        let counts = Counts {
            strings: reader.read_u16::<LittleEndian>()?,
            dirs: reader.read_u16::<LittleEndian>()?,
            files: reader.read_u16::<LittleEndian>()?,
            hives: reader.read_u16::<LittleEndian>()?,
            keys: reader.read_u16::<LittleEndian>()?,
            links: reader.read_u16::<LittleEndian>()?,
        };
        let offsets = Offsets {
            strings: reader.read_u32::<LittleEndian>()?,
            dirs: reader.read_u32::<LittleEndian>()?,
            files: reader.read_u32::<LittleEndian>()?,
            hives: reader.read_u32::<LittleEndian>()?,
            keys: reader.read_u32::<LittleEndian>()?,
            links: reader.read_u32::<LittleEndian>()?,
        };
        let app_name_offset = reader.read_u16::<LittleEndian>()?;
        let app_name_length = reader.read_u16::<LittleEndian>()?;
        let provider_offset = reader.read_u16::<LittleEndian>()?;
        let provider_length = reader.read_u16::<LittleEndian>()?;
        let unsupported_offset = reader.read_u16::<LittleEndian>()?;
        let unsupported_length = reader.read_u16::<LittleEndian>()?;
        let _unknown4 = reader.read_u16::<LittleEndian>()?;
        let _unknown5 = reader.read_u16::<LittleEndian>()?;

        let strings = read_strings(&mut reader, &offsets, &counts)
            .map_err(truncated("STRINGS"))?;
        let dirs = read_dirs(&mut reader, &offsets, &counts, &strings)
            .map_err(truncated("DIRS"))?;
        let files = read_files(&mut reader, &offsets, &counts, &dirs)
            .map_err(truncated("FILES"))?;
        let mut hives = read_hives(&mut reader, &offsets, &counts, &strings)
            .map_err(truncated("REGHIVES"))?;
        read_keys(&mut reader, &offsets, &counts, &mut hives)
            .map_err(truncated("REGKEYS"))?;
        let links =
            read_links(&mut reader, &offsets, &counts, &strings, &dirs, &files)
                .map_err(truncated("LINKS"))?;

        reader.seek(SeekFrom::Start(app_name_offset as u64))?;
        let app_name = read_fixed_string(&mut reader, app_name_length as usize)
            .map_err(truncated("APPNAME"))?;
        reader.seek(SeekFrom::Start(provider_offset as u64))?;
        let provider = read_fixed_string(&mut reader, provider_length as usize)
            .map_err(truncated("PROVIDER"))?;
        let unsupported = if unsupported_length == 0 {
            None
        } else {
            reader.seek(SeekFrom::Start(unsupported_offset as u64))?;
            let mut bytes = vec![0u8; unsupported_length as usize];
            reader
                .read_exact(&mut bytes)
                .map_err(truncated("UNSUPPORTED"))?;
            Some(split_multi_string(&bytes)).filter(|list| !list.is_empty())
        };

        let header = LegacyHeader {
            app_name,
            provider,
            unsupported,
            min_ce_version: (min_major != 0).then(|| MinCeVersion {
                min_ce_version_major: min_major,
                min_ce_version_minor: min_minor,
                min_ce_version_string: format!("{}.{}", min_major, min_minor),
            }),
            max_ce_version: (max_major != 0).then(|| MaxCeVersion {
                max_ce_version_major: max_major,
                max_ce_version_minor: max_minor,
                max_ce_version_string: format!("{}.{}", max_major, max_minor),
            }),
            min_ce_build_number: Some(min_build).filter(|&b| b != 0),
            max_ce_build_number: Some(max_build).filter(|&b| b != 0),
            files: files.into_iter().map(|(_, file)| file).collect(),
            registry_entries: hives.into_iter().map(|(_, hive)| hive).collect(),
            links,
        };
        debug!(
            app = %header.app_name,
            architecture_id,
            strings = strings.len(),
            dirs = dirs.len(),
            files = header.files.len(),
            hives = header.registry_entries.len(),
            links = header.links.len(),
            "Read setup file"
        );
        Ok(Cab000Reader { file_length, architecture_id, header })
    }

    /// Returns the total length of the setup file, as recorded in its
    /// header.
    pub fn file_length(&self) -> u32 {
        self.file_length
    }

    /// Returns the raw target architecture id.
    pub fn architecture_id(&self) -> u32 {
        self.architecture_id
    }

    /// Returns the CPU family the cabinet was built for, or `None` if the
    /// file names no architecture (or one that isn't recognized).
    pub fn architecture(&self) -> Option<Architecture> {
        Architecture::from_id(self.architecture_id)
    }

    /// Returns the decoded header.
    pub fn header(&self) -> &LegacyHeader {
        &self.header
    }

    /// Consumes the reader, returning the decoded header.
    pub fn into_header(self) -> LegacyHeader {
        self.header
    }
}

fn truncated(section: &'static str) -> impl Fn(io::Error) -> io::Error {
    move |error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} section is truncated", section),
            )
        } else {
            error
        }
    }
}

fn read_spec<R: Read>(
    reader: &mut R,
    strings: &HashMap<u16, String>,
) -> io::Result<Vec<String>> {
    let spec_length = reader.read_u16::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; spec_length];
    reader.read_exact(&mut bytes)?;
    let mut parts = Vec::new();
    for chunk in bytes.chunks_exact(2) {
        let string_id = LittleEndian::read_u16(chunk);
        if string_id == 0 {
            break;
        }
        match strings.get(&string_id) {
            Some(string) => parts.push(string.clone()),
            None => invalid_data!("Reference to missing string {}", string_id),
        }
    }
    Ok(parts)
}

fn read_strings<R: Read + Seek>(
    reader: &mut R,
    offsets: &Offsets,
    counts: &Counts,
) -> io::Result<HashMap<u16, String>> {
    reader.seek(SeekFrom::Start(offsets.strings as u64))?;
    let mut strings = HashMap::with_capacity(counts.strings as usize);
    for _ in 0..counts.strings {
        let id = reader.read_u16::<LittleEndian>()?;
        let length = reader.read_u16::<LittleEndian>()?;
        let string = read_fixed_string(reader, length as usize)?;
        strings.entry(id).or_insert(string);
    }
    Ok(strings)
}

/// Returns each directory's reference, e.g. `%CE1%\App`, by id.
fn read_dirs<R: Read + Seek>(
    reader: &mut R,
    offsets: &Offsets,
    counts: &Counts,
    strings: &HashMap<u16, String>,
) -> io::Result<HashMap<u16, String>> {
    reader.seek(SeekFrom::Start(offsets.dirs as u64))?;
    let mut dirs = HashMap::with_capacity(counts.dirs as usize);
    for _ in 0..counts.dirs {
        let id = reader.read_u16::<LittleEndian>()?;
        let reference = read_spec(reader, strings)?.join("\\");
        trace!(id, reference = %reference, "Read directory");
        dirs.insert(id, reference);
    }
    Ok(dirs)
}

fn directory_reference(
    dirs: &HashMap<u16, String>,
    id: u16,
) -> io::Result<String> {
    if id == 0 {
        return Ok(consts::INSTALL_DIR_TOKEN.to_string());
    }
    match dirs.get(&id) {
        Some(reference) => Ok(reference.clone()),
        None => invalid_data!("Reference to missing directory {}", id),
    }
}

fn read_files<R: Read + Seek>(
    reader: &mut R,
    offsets: &Offsets,
    counts: &Counts,
    dirs: &HashMap<u16, String>,
) -> io::Result<Vec<(u16, LegacyFile)>> {
    reader.seek(SeekFrom::Start(offsets.files as u64))?;
    let mut files = Vec::with_capacity(counts.files as usize);
    for _ in 0..counts.files {
        let id = reader.read_u16::<LittleEndian>()?;
        let dir_id = reader.read_u16::<LittleEndian>()?;
        let _unknown = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u32::<LittleEndian>()?;
        let name_length = reader.read_u16::<LittleEndian>()?;
        let name = read_fixed_string(reader, name_length as usize)?;
        let mut file =
            LegacyFile::new(id, name, directory_reference(dirs, dir_id)?);
        file.flags = FileFlagFields::from(FileFlags::from_bits_truncate(flags));
        files.push((id, file));
    }
    Ok(files)
}

fn hive_root_name(root: u16) -> Option<&'static str> {
    match root {
        consts::HIVE_CLASSES_ROOT => Some("HKCR"),
        consts::HIVE_CURRENT_USER => Some("HKCU"),
        consts::HIVE_LOCAL_MACHINE => Some("HKLM"),
        consts::HIVE_USERS => Some("HKU"),
        _ => None,
    }
}

fn read_hives<R: Read + Seek>(
    reader: &mut R,
    offsets: &Offsets,
    counts: &Counts,
    strings: &HashMap<u16, String>,
) -> io::Result<Vec<(u16, LegacyHive)>> {
    reader.seek(SeekFrom::Start(offsets.hives as u64))?;
    let mut hives = Vec::with_capacity(counts.hives as usize);
    for _ in 0..counts.hives {
        let id = reader.read_u16::<LittleEndian>()?;
        let root = reader.read_u16::<LittleEndian>()?;
        let _unknown = reader.read_u16::<LittleEndian>()?;
        let root = match hive_root_name(root) {
            Some(name) => name,
            None => invalid_data!("Invalid hive root {} for hive {}", root, id),
        };
        let mut path = root.to_string();
        for part in read_spec(reader, strings)? {
            path.push('\\');
            path.push_str(&part);
        }
        hives.push((id, LegacyHive { hive: path, keys: LegacyKeys::new() }));
    }
    Ok(hives)
}

fn decode_value(type_flags: u32, data: &[u8]) -> io::Result<LegacyValue> {
    let value = match type_flags & consts::TYPE_REG_MASK {
        consts::TYPE_REG_DWORD => {
            if data.len() < 4 {
                invalid_data!(
                    "DWORD registry value has only {} bytes",
                    data.len()
                );
            }
            let number = LittleEndian::read_u32(data);
            LegacyValue::text("REG_DWORD", number.to_string())
        }
        consts::TYPE_REG_SZ => LegacyValue::text("REG_SZ", decode_string(data)),
        consts::TYPE_REG_MULTI_SZ => {
            LegacyValue::multi_sz(split_multi_string(data))
        }
        consts::TYPE_REG_BINARY => {
            let hex: String =
                data.iter().map(|byte| format!("{:02x}", byte)).collect();
            LegacyValue::text("REG_BINARY", hex)
        }
        other => invalid_data!("Invalid registry value type {:#x}", other),
    };
    Ok(value)
}

fn read_keys<R: Read + Seek>(
    reader: &mut R,
    offsets: &Offsets,
    counts: &Counts,
    hives: &mut [(u16, LegacyHive)],
) -> io::Result<()> {
    reader.seek(SeekFrom::Start(offsets.keys as u64))?;
    for _ in 0..counts.keys {
        let id = reader.read_u16::<LittleEndian>()?;
        let hive_id = reader.read_u16::<LittleEndian>()?;
        let _variable_substitution = reader.read_u16::<LittleEndian>()?;
        let type_flags = reader.read_u32::<LittleEndian>()?;
        let data_length = reader.read_u16::<LittleEndian>()?;
        let mut data = vec![0u8; data_length as usize];
        reader.read_exact(&mut data)?;
        let (name, data) = split_null_terminated(&data)?;
        let value = decode_value(type_flags, data)?;
        let hive = match hives.iter_mut().find(|(hid, _)| *hid == hive_id) {
            Some((_, hive)) => hive,
            None => invalid_data!(
                "Registry key {} refers to missing hive {}",
                id,
                hive_id
            ),
        };
        let key = if name.is_empty() { None } else { Some(name) };
        // A key seen again joins its first occurrence, so values keep their
        // order within a key but keys are ordered by first appearance.
        hive.keys.extend_key(key, value);
    }
    Ok(())
}

fn base_directory(base: u16) -> io::Result<String> {
    if base == 0 {
        return Ok(consts::INSTALL_DIR_TOKEN.to_string());
    }
    match u8::try_from(base).ok().and_then(DirectoryToken::new) {
        Some(token) => Ok(token.to_string()),
        None => invalid_data!("Invalid link base directory {}", base),
    }
}

fn read_links<R: Read + Seek>(
    reader: &mut R,
    offsets: &Offsets,
    counts: &Counts,
    strings: &HashMap<u16, String>,
    dirs: &HashMap<u16, String>,
    files: &[(u16, LegacyFile)],
) -> io::Result<Vec<LegacyLink>> {
    reader.seek(SeekFrom::Start(offsets.links as u64))?;
    let mut links = Vec::with_capacity(counts.links as usize);
    for _ in 0..counts.links {
        let _id = reader.read_u16::<LittleEndian>()?;
        let _unknown = reader.read_u16::<LittleEndian>()?;
        let base = base_directory(reader.read_u16::<LittleEndian>()?)?;
        let target_id = reader.read_u16::<LittleEndian>()?;
        let link_type = reader.read_u16::<LittleEndian>()?;
        let mut link_path = base;
        for part in read_spec(reader, strings)? {
            link_path.push('\\');
            link_path.push_str(&part);
        }
        let link = if link_type == consts::LINK_TYPE_FILE {
            let target_path = files
                .iter()
                .find(|(id, _)| *id == target_id)
                .map(|(_, file)| format!("{}\\{}", file.directory, file.name))
                .unwrap_or_default();
            LegacyLink {
                is_file: true,
                target_id: Some(u32::from(target_id)),
                target_token: None,
                link_path,
                target_path,
            }
        } else if link_type == consts::LINK_TYPE_DIRECTORY {
            let reference = directory_reference(dirs, target_id)?;
            LegacyLink {
                is_file: false,
                target_id: None,
                target_token: Some(reference.clone()),
                link_path,
                target_path: reference,
            }
        } else {
            invalid_data!("Invalid link type {}", link_type)
        };
        links.push(link);
    }
    Ok(links)
}
