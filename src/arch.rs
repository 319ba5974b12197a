use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The class of Windows CE device a setup header targets.  The variant
/// selects which table of well-known directories applies.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ArchitectureVariant {
    /// Handheld PC.
    Hpc,
    /// Palm-size PC.
    PalmSize,
    /// Pocket PC.
    PocketPc,
}

impl ArchitectureVariant {
    /// All variants, in table order.
    pub const ALL: [ArchitectureVariant; 3] = [
        ArchitectureVariant::Hpc,
        ArchitectureVariant::PalmSize,
        ArchitectureVariant::PocketPc,
    ];

    /// Returns the short lowercase name of this variant.
    pub fn as_str(self) -> &'static str {
        match self {
            ArchitectureVariant::Hpc => "hpc",
            ArchitectureVariant::PalmSize => "palm-size",
            ArchitectureVariant::PocketPc => "pocket-pc",
        }
    }
}

impl fmt::Display for ArchitectureVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchitectureVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArchitectureVariant::ALL
            .into_iter()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown architecture variant: {:?}", s))
    }
}

/// The CPU family a cabinet was built for, as recorded in the target
/// architecture field of a `.000` header.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Architecture {
    /// Hitachi SuperH SH3 (including SH3E).
    Sh3,
    /// Hitachi SuperH SH4.
    Sh4,
    /// Intel 386, 486 and Pentium.
    X86,
    /// PowerPC 601.
    Ppc601,
    /// PowerPC 603.
    Ppc603,
    /// PowerPC 604.
    Ppc604,
    /// PowerPC 620.
    Ppc620,
    /// Motorola 821.
    Motorola821,
    /// ARM 720, 820, 920 and StrongARM.
    Arm,
    /// MIPS R4000.
    Mips,
    /// Alpha 21064.
    Alpha,
    /// ARM 7TDMI (Thumb).
    Thumb,
}

impl Architecture {
    /// Decodes a numeric target architecture id.  Returns `None` for 0 (no
    /// specific architecture) and for ids that are not recognized.
    pub fn from_id(id: u32) -> Option<Architecture> {
        let arch = match id {
            103 | 10003 | 10004 => Architecture::Sh3,
            104 | 10005 => Architecture::Sh4,
            386 | 486 | 586 => Architecture::X86,
            601 => Architecture::Ppc601,
            603 => Architecture::Ppc603,
            604 => Architecture::Ppc604,
            620 => Architecture::Ppc620,
            821 => Architecture::Motorola821,
            1824 | 2080 | 2336 | 2577 => Architecture::Arm,
            4000 => Architecture::Mips,
            21064 => Architecture::Alpha,
            70001 => Architecture::Thumb,
            _ => return None,
        };
        Some(arch)
    }
}

/// A platform a cabinet can declare itself unsupported on.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize,
    Deserialize,
)]
pub enum Platform {
    /// `PALM-SIZE PC`
    #[serde(rename = "PALM-SIZE PC")]
    PalmSizePc,
    /// `HPC`
    #[serde(rename = "HPC")]
    Hpc,
    /// `PALM PC`
    #[serde(rename = "PALM PC")]
    PalmPc,
    /// `PALM PC2`
    #[serde(rename = "PALM PC2")]
    PalmPc2,
    /// `POCKETPC`
    #[serde(rename = "POCKETPC")]
    PocketPc,
    /// `JUPITER`
    #[serde(rename = "JUPITER")]
    Jupiter,
}

impl Platform {
    /// All known platform identifiers.
    pub const ALL: [Platform; 6] = [
        Platform::PalmSizePc,
        Platform::Hpc,
        Platform::PalmPc,
        Platform::PalmPc2,
        Platform::PocketPc,
        Platform::Jupiter,
    ];

    /// Returns the canonical spelling of this identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::PalmSizePc => "PALM-SIZE PC",
            Platform::Hpc => "HPC",
            Platform::PalmPc => "PALM PC",
            Platform::PalmPc2 => "PALM PC2",
            Platform::PocketPc => "POCKETPC",
            Platform::Jupiter => "JUPITER",
        }
    }

    /// Looks up an identifier, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Platform> {
        Platform::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{Architecture, ArchitectureVariant, Platform};

    #[test]
    fn architecture_from_id() {
        assert_eq!(Architecture::from_id(0), None);
        assert_eq!(Architecture::from_id(10004), Some(Architecture::Sh3));
        assert_eq!(Architecture::from_id(586), Some(Architecture::X86));
        assert_eq!(Architecture::from_id(2577), Some(Architecture::Arm));
        assert_eq!(Architecture::from_id(70001), Some(Architecture::Thumb));
        assert_eq!(Architecture::from_id(12345), None);
    }

    #[test]
    fn platform_names_ignore_case() {
        assert_eq!(Platform::from_name("Palm PC2"), Some(Platform::PalmPc2));
        assert_eq!(Platform::from_name("pocketpc"), Some(Platform::PocketPc));
        assert_eq!(Platform::from_name("POCKET PC"), None);
        for platform in Platform::ALL {
            assert_eq!(Platform::from_name(platform.as_str()), Some(platform));
        }
    }

    #[test]
    fn variant_names() {
        assert_eq!(
            "Palm-Size".parse::<ArchitectureVariant>(),
            Ok(ArchitectureVariant::PalmSize)
        );
        assert!("desktop".parse::<ArchitectureVariant>().is_err());
        assert_eq!(ArchitectureVariant::PocketPc.to_string(), "pocket-pc");
        assert_eq!(
            serde_json::to_string(&ArchitectureVariant::PalmSize).unwrap(),
            "\"palm-size\""
        );
    }
}
