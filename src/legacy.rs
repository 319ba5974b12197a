use std::fmt;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::consts;
use crate::file::FileFlagFields;

/// A setup header in the older shape: implicit directories given as
/// symbolic references on each file, and registry values nested under
/// hive and key.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyHeader {
    /// The application name.
    pub app_name: String,
    /// The application provider.
    pub provider: String,
    /// Platform names the cabinet refuses to install on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsupported: Option<Vec<String>>,
    /// Lowest Windows CE version the cabinet installs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ce_version: Option<MinCeVersion>,
    /// Highest Windows CE version the cabinet installs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ce_version: Option<MaxCeVersion>,
    /// Lowest Windows CE build number the cabinet installs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ce_build_number: Option<u32>,
    /// Highest Windows CE build number the cabinet installs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ce_build_number: Option<u32>,
    /// Files to install, in declaration order.
    #[serde(default)]
    pub files: Vec<LegacyFile>,
    /// Registry provisioning, in declaration order.
    #[serde(default)]
    pub registry_entries: Vec<LegacyHive>,
    /// Shortcuts to create, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LegacyLink>,
}

/// A lower version gate, as spelled in the older shape.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinCeVersion {
    /// Major version number.
    pub min_ce_version_major: u32,
    /// Minor version number.
    pub min_ce_version_minor: u32,
    /// Human-readable rendering; carried through, never parsed.
    #[serde(default)]
    pub min_ce_version_string: String,
}

/// An upper version gate, as spelled in the older shape.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxCeVersion {
    /// Major version number.
    pub max_ce_version_major: u32,
    /// Minor version number.
    pub max_ce_version_minor: u32,
    /// Human-readable rendering; carried through, never parsed.
    #[serde(default)]
    pub max_ce_version_string: String,
}

/// One file to install.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFile {
    /// The file's id, unique within the header.
    pub file_id: u16,
    /// The name the file is installed under.
    #[serde(default, alias = "fileName")]
    pub name: String,
    /// Symbolic directory reference, e.g. `%CE1%` or `%CE1%\App`.
    pub directory: String,
    /// Installation behavior flags.
    #[serde(flatten)]
    pub flags: FileFlagFields,
}

impl LegacyFile {
    /// Creates a file entry with no flags set.
    pub fn new<S, D>(file_id: u16, name: S, directory: D) -> LegacyFile
    where
        S: Into<String>,
        D: Into<String>,
    {
        LegacyFile {
            file_id,
            name: name.into(),
            directory: directory.into(),
            flags: FileFlagFields::default(),
        }
    }
}

/// The registry values provisioned under one hive path.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LegacyHive {
    /// The hive path, e.g. `HKLM` or `HKLM\Software\Vendor`.
    pub hive: String,
    /// Keys in declaration order.
    #[serde(default)]
    pub keys: LegacyKeys,
}

/// An ordered mapping from key name to value list.  A key of `None` stands
/// for the hive's default value and is spelled `"@"` in JSON.  Keys iterate
/// in the order they were declared.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LegacyKeys {
    entries: Vec<(Option<String>, Vec<LegacyValue>)>,
}

impl LegacyKeys {
    /// Creates an empty key list.
    pub fn new() -> LegacyKeys {
        LegacyKeys { entries: Vec::new() }
    }

    /// Appends a key and its values.
    pub fn push(&mut self, key: Option<String>, values: Vec<LegacyValue>) {
        self.entries.push((key, values));
    }

    /// Appends a value to an existing key, or adds the key if it is new.  An
    /// existing key keeps its position, so values added this way are
    /// ordered by key first.
    pub fn extend_key(&mut self, key: Option<String>, value: LegacyValue) {
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Returns an iterator over the keys and their values, in declaration
    /// order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (Option<&str>, &[LegacyValue])> + '_ {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_deref(), values.as_slice()))
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for LegacyKeys {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            let name = key.as_deref().unwrap_or(consts::DEFAULT_KEY_NAME);
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LegacyKeys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeysVisitor;

        impl<'de> Visitor<'de> for KeysVisitor {
            type Value = LegacyKeys;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from registry key name to value list")
            }

            fn visit_map<A>(self, mut access: A) -> Result<LegacyKeys, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut keys = LegacyKeys::new();
                while let Some((name, values)) =
                    access.next_entry::<String, Vec<LegacyValue>>()?
                {
                    let key = if name == consts::DEFAULT_KEY_NAME {
                        None
                    } else {
                        Some(name)
                    };
                    keys.push(key, values);
                }
                Ok(keys)
            }
        }

        deserializer.deserialize_map(KeysVisitor)
    }
}

/// One registry value.  The type discriminator is kept as written so that a
/// bad one is reported alongside every other problem in the header.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LegacyValue {
    /// `REG_DWORD` (the default when absent), `REG_BINARY`, `REG_SZ` or
    /// `REG_MULTI_SZ`.
    #[serde(
        rename = "type",
        alias = "dataType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data_type: Option<String>,
    /// The value's data.
    pub value: LegacyValueData,
}

impl LegacyValue {
    /// A value with no explicit type (treated as `REG_DWORD`).
    pub fn untyped<S: Into<String>>(value: S) -> LegacyValue {
        LegacyValue {
            data_type: None,
            value: LegacyValueData::Text(value.into()),
        }
    }

    /// A value with an explicit type and string data.
    pub fn text<T, S>(data_type: T, value: S) -> LegacyValue
    where
        T: Into<String>,
        S: Into<String>,
    {
        LegacyValue {
            data_type: Some(data_type.into()),
            value: LegacyValueData::Text(value.into()),
        }
    }

    /// A `REG_MULTI_SZ` value.
    pub fn multi_sz<I, S>(strings: I) -> LegacyValue
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LegacyValue {
            data_type: Some("REG_MULTI_SZ".to_string()),
            value: LegacyValueData::List(
                strings.into_iter().map(Into::into).collect(),
            ),
        }
    }
}

/// The data of a registry value: a single string, a number or a string
/// list.  Anything else is kept as `Unrecognized` so that it is reported
/// with the header's other problems instead of failing the whole document.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyValueData {
    /// Scalar data.
    Text(String),
    /// Numeric data, accepted for `REG_DWORD`.
    Number(u64),
    /// List data, for `REG_MULTI_SZ`.
    List(Vec<String>),
    /// Data of any other shape.
    Unrecognized(UnrecognizedData),
}

/// Registry value data whose JSON shape matches no known form.  The content
/// is discarded and serializes as `null`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UnrecognizedData;

impl Serialize for UnrecognizedData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_none()
    }
}

impl<'de> Deserialize<'de> for UnrecognizedData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IgnoredAny::deserialize(deserializer)?;
        Ok(UnrecognizedData)
    }
}

/// A shortcut to create, pointing at a file (by id) or a directory (by
/// symbolic reference or by an assigned directory id).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyLink {
    /// True if the link targets a file rather than a directory.
    pub is_file: bool,
    /// The target file id, or an already-assigned directory id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u32>,
    /// The target directory reference, for directory links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_token: Option<String>,
    /// Where the shortcut itself is created.
    pub link_path: String,
    /// Where the shortcut points, for display.
    #[serde(default)]
    pub target_path: String,
}

#[cfg(test)]
mod tests {
    use super::{LegacyHeader, LegacyValue, LegacyValueData, UnrecognizedData};

    #[test]
    fn extended_key_keeps_its_first_position() {
        let mut keys = super::LegacyKeys::new();
        keys.extend_key(Some("A".to_string()), LegacyValue::untyped("1"));
        keys.extend_key(Some("B".to_string()), LegacyValue::untyped("2"));
        keys.extend_key(Some("A".to_string()), LegacyValue::untyped("3"));
        let summary: Vec<(Option<&str>, usize)> =
            keys.iter().map(|(key, values)| (key, values.len())).collect();
        assert_eq!(summary, vec![(Some("A"), 2), (Some("B"), 1)]);
        let (_, values) = keys.iter().next().unwrap();
        assert_eq!(values[1], LegacyValue::untyped("3"));
    }

    #[test]
    fn value_data_of_any_shape_deserializes() {
        let json = r#"[
            {"value": "12"},
            {"value": 12},
            {"type": "REG_MULTI_SZ", "value": ["a"]},
            {"value": -3},
            {"value": {"nested": true}},
            {"value": ["a", 1]}
        ]"#;
        let values: Vec<LegacyValue> = serde_json::from_str(json).unwrap();
        let data: Vec<&LegacyValueData> =
            values.iter().map(|value| &value.value).collect();
        assert_eq!(
            data,
            vec![
                &LegacyValueData::Text("12".to_string()),
                &LegacyValueData::Number(12),
                &LegacyValueData::List(vec!["a".to_string()]),
                &LegacyValueData::Unrecognized(UnrecognizedData),
                &LegacyValueData::Unrecognized(UnrecognizedData),
                &LegacyValueData::Unrecognized(UnrecognizedData),
            ]
        );
    }

    #[test]
    fn keys_keep_document_order() {
        let json = r#"{
            "appName": "App",
            "provider": "Vendor",
            "files": [],
            "registryEntries": [{
                "hive": "HKLM",
                "keys": {
                    "zeta": [{"value": "1"}],
                    "@": [{"type": "REG_SZ", "value": "default"}],
                    "alpha": [{"type": "REG_MULTI_SZ", "value": ["b", "a"]}],
                    "": [{"type": "REG_BINARY", "value": "00ff"}]
                }
            }]
        }"#;
        let header: LegacyHeader = serde_json::from_str(json).unwrap();
        let keys: Vec<Option<&str>> = header.registry_entries[0]
            .keys
            .iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec![Some("zeta"), None, Some("alpha"), Some("")]);
        let (_, values) = header.registry_entries[0].keys.iter().nth(2).unwrap();
        assert_eq!(values, &[LegacyValue::multi_sz(["b", "a"])]);
    }

    #[test]
    fn keys_serialize_in_order() {
        let mut header = LegacyHeader::default();
        let mut hive = super::LegacyHive {
            hive: "HKCU".to_string(),
            ..Default::default()
        };
        hive.keys.push(Some("b".to_string()), vec![LegacyValue::untyped("1")]);
        hive.keys.push(None, vec![LegacyValue::untyped("2")]);
        header.registry_entries.push(hive);
        let json = serde_json::to_string(&header.registry_entries).unwrap();
        assert_eq!(
            json,
            r#"[{"hive":"HKCU","keys":{"b":[{"value":"1"}],"@":[{"value":"2"}]}}]"#
        );
    }

    #[test]
    fn file_flags_default_to_false() {
        let json = r#"{
            "appName": "App",
            "provider": "Vendor",
            "files": [
                {"fileId": 1, "fileName": "a.exe", "directory": "%CE1%",
                 "selfRegisterDll": true}
            ],
            "registryEntries": []
        }"#;
        let header: LegacyHeader = serde_json::from_str(json).unwrap();
        let file = &header.files[0];
        assert_eq!(file.name, "a.exe");
        assert!(file.flags.self_register_dll);
        assert!(!file.flags.ignore_cab_file_date);
        assert!(!file.flags.warn_if_skipped);
    }

    #[test]
    fn value_data_accepts_text_or_list() {
        let value: LegacyValue =
            serde_json::from_str(r#"{"dataType": "REG_BINARY", "value": "ab"}"#)
                .unwrap();
        assert_eq!(value, LegacyValue::text("REG_BINARY", "ab"));
        let value: LegacyValue =
            serde_json::from_str(r#"{"value": ["x"]}"#).unwrap();
        assert_eq!(value.data_type, None);
        assert_eq!(value.value, LegacyValueData::List(vec!["x".to_string()]));
    }
}
