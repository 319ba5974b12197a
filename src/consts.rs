pub const HEADER_SIGNATURE: u32 = 0x4543534d; // "MSCE" stored little-endian
pub const HEADER_SIZE: u64 = 100;

// Registry value types, masked out of a REGKEYS entry's type flags:
pub const TYPE_REG_MASK: u32 = 0x0001_0001;
pub const TYPE_REG_DWORD: u32 = 0x0001_0001;
pub const TYPE_REG_SZ: u32 = 0x0000_0000;
pub const TYPE_REG_MULTI_SZ: u32 = 0x0001_0000;
pub const TYPE_REG_BINARY: u32 = 0x0000_0001;

// File flags:
pub const FILE_WARN_IF_SKIPPED: u32 = 1 << 0;
pub const FILE_DO_NOT_SKIP: u32 = 1 << 1;
pub const FILE_OVERWRITE_TARGET_IF_EXISTS: u32 = 1 << 4;
pub const FILE_DO_NOT_COPY_UNLESS_TARGET_EXISTS: u32 = 1 << 10;
pub const FILE_SELF_REGISTER_DLL: u32 = 1 << 28;
pub const FILE_DO_NOT_OVERWRITE_IF_TARGET_IS_NEWER: u32 = 1 << 29;
pub const FILE_IGNORE_CAB_FILE_DATE: u32 = 1 << 30;
pub const FILE_REFERENCE_COUNTING_SHARED: u32 = 1 << 31;

// Link types:
pub const LINK_TYPE_DIRECTORY: u16 = 0;
pub const LINK_TYPE_FILE: u16 = 1;

// Hive roots:
pub const HIVE_CLASSES_ROOT: u16 = 1;
pub const HIVE_CURRENT_USER: u16 = 2;
pub const HIVE_LOCAL_MACHINE: u16 = 3;
pub const HIVE_USERS: u16 = 4;

pub const INSTALL_DIR_TOKEN: &str = "%InstallDir%";
pub const DEFAULT_KEY_NAME: &str = "@";
