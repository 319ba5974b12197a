use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::error::{ErrorReport, NormalizeError};
use crate::legacy::{LegacyHive, LegacyValue, LegacyValueData};

/// The type of a registry value.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum RegistryDataType {
    /// A 32-bit number.
    Dword,
    /// Raw bytes.
    Binary,
    /// A string.
    Sz,
    /// An ordered list of strings.
    MultiSz,
}

impl RegistryDataType {
    /// Returns the canonical name of this type, e.g. `MULTI_SZ`.
    pub fn as_str(self) -> &'static str {
        match self {
            RegistryDataType::Dword => "DWORD",
            RegistryDataType::Binary => "BINARY",
            RegistryDataType::Sz => "SZ",
            RegistryDataType::MultiSz => "MULTI_SZ",
        }
    }

    /// Parses a type discriminator, with or without the `REG_` prefix.
    pub fn from_name(name: &str) -> Option<RegistryDataType> {
        match name.strip_prefix("REG_").unwrap_or(name) {
            "DWORD" => Some(RegistryDataType::Dword),
            "BINARY" => Some(RegistryDataType::Binary),
            "SZ" => Some(RegistryDataType::Sz),
            "MULTI_SZ" => Some(RegistryDataType::MultiSz),
            _ => None,
        }
    }
}

impl fmt::Display for RegistryDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed registry value.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(tag = "dataType", content = "value")]
pub enum RegistryValue {
    /// A 32-bit number, as written in the header.
    #[serde(rename = "DWORD")]
    Dword(String),
    /// Raw bytes, as written in the header.
    #[serde(rename = "BINARY")]
    Binary(String),
    /// A string.
    #[serde(rename = "SZ")]
    Sz(String),
    /// An ordered list of strings.  Never reordered or deduplicated.
    #[serde(rename = "MULTI_SZ")]
    MultiSz(Vec<String>),
}

impl RegistryValue {
    /// Returns the type of this value.
    pub fn data_type(&self) -> RegistryDataType {
        match self {
            RegistryValue::Dword(_) => RegistryDataType::Dword,
            RegistryValue::Binary(_) => RegistryDataType::Binary,
            RegistryValue::Sz(_) => RegistryDataType::Sz,
            RegistryValue::MultiSz(_) => RegistryDataType::MultiSz,
        }
    }

    fn from_legacy(value: &LegacyValue) -> Result<RegistryValue, String> {
        let data_type = match value.data_type.as_deref() {
            None => RegistryDataType::Dword,
            Some(name) => RegistryDataType::from_name(name)
                .ok_or_else(|| format!("unknown data type {:?}", name))?,
        };
        match (data_type, &value.value) {
            (RegistryDataType::Dword, LegacyValueData::Text(text)) => {
                Ok(RegistryValue::Dword(text.clone()))
            }
            (RegistryDataType::Binary, LegacyValueData::Text(text)) => {
                Ok(RegistryValue::Binary(text.clone()))
            }
            (RegistryDataType::Sz, LegacyValueData::Text(text)) => {
                Ok(RegistryValue::Sz(text.clone()))
            }
            (RegistryDataType::Dword, LegacyValueData::Number(number)) => {
                match u32::try_from(*number) {
                    Ok(number) => Ok(RegistryValue::Dword(number.to_string())),
                    Err(_) => Err(format!(
                        "{} data {} does not fit in 32 bits",
                        data_type, number
                    )),
                }
            }
            (RegistryDataType::MultiSz, LegacyValueData::List(list)) => {
                Ok(RegistryValue::MultiSz(list.clone()))
            }
            (RegistryDataType::MultiSz, _) => {
                Err(format!("{} data must be a list of strings", data_type))
            }
            (_, _) => {
                Err(format!("{} data must be a single string", data_type))
            }
        }
    }
}

/// One registry value to provision.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    hive_path: String,
    key_name: Option<String>,
    #[serde(flatten)]
    value: RegistryValue,
}

impl RegistryEntry {
    /// Returns the hive path the value lives under.
    pub fn hive_path(&self) -> &str {
        &self.hive_path
    }

    /// Returns the key name, or `None` for the hive's default value.  An
    /// empty name is a distinct, present key.
    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    /// Returns the typed value.
    pub fn value(&self) -> &RegistryValue {
        &self.value
    }
}

/// Flattens nested hive/key/value declarations into one entry per value,
/// ordered by hive, then key declaration, then value.
pub fn flatten_registry(
    hives: &[LegacyHive],
) -> Result<Vec<RegistryEntry>, ErrorReport> {
    let mut errors = Vec::new();
    let entries = collect_registry(hives, &mut errors);
    ErrorReport::into_result(errors, entries)
}

pub(crate) fn collect_registry(
    hives: &[LegacyHive],
    errors: &mut Vec<NormalizeError>,
) -> Vec<RegistryEntry> {
    let mut entries = Vec::new();
    for hive in hives {
        for (key, values) in hive.keys.iter() {
            for (index, value) in values.iter().enumerate() {
                match RegistryValue::from_legacy(value) {
                    Ok(value) => {
                        trace!(hive = %hive.hive, key, index, "Flattened value");
                        entries.push(RegistryEntry {
                            hive_path: hive.hive.clone(),
                            key_name: key.map(str::to_string),
                            value,
                        });
                    }
                    Err(detail) => {
                        errors.push(NormalizeError::InvalidRegistryValueShape {
                            hive: hive.hive.clone(),
                            key: key.map(str::to_string),
                            index,
                            detail,
                        });
                    }
                }
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::{
        collect_registry, flatten_registry, RegistryDataType, RegistryValue,
    };
    use crate::error::NormalizeError;
    use crate::legacy::{
        LegacyHive, LegacyKeys, LegacyValue, LegacyValueData, UnrecognizedData,
    };

    fn hive(name: &str, keys: LegacyKeys) -> LegacyHive {
        LegacyHive { hive: name.to_string(), keys }
    }

    #[test]
    fn multi_sz_entry_is_kept_in_order() {
        let mut keys = LegacyKeys::new();
        keys.push(
            Some("Software\\X".to_string()),
            vec![LegacyValue::multi_sz(["a", "b"])],
        );
        let entries = flatten_registry(&[hive("HKLM", keys)]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hive_path(), "HKLM");
        assert_eq!(entries[0].key_name(), Some("Software\\X"));
        assert_eq!(
            entries[0].value(),
            &RegistryValue::MultiSz(vec!["a".to_string(), "b".to_string()])
        );
        let json = serde_json::to_string(&entries[0]).unwrap();
        assert_eq!(
            json,
            r#"{"hivePath":"HKLM","keyName":"Software\\X","dataType":"MULTI_SZ","value":["a","b"]}"#
        );
    }

    #[test]
    fn order_is_hive_then_key_then_value() {
        let mut first = LegacyKeys::new();
        first.push(
            Some("b".to_string()),
            vec![LegacyValue::untyped("1"), LegacyValue::untyped("2")],
        );
        first.push(None, vec![LegacyValue::text("REG_SZ", "3")]);
        let mut second = LegacyKeys::new();
        second.push(Some("".to_string()), vec![LegacyValue::text("BINARY", "04")]);
        let entries =
            flatten_registry(&[hive("HKCU", first), hive("HKLM", second)])
                .unwrap();
        let summary: Vec<(&str, Option<&str>, RegistryDataType)> = entries
            .iter()
            .map(|e| (e.hive_path(), e.key_name(), e.value().data_type()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("HKCU", Some("b"), RegistryDataType::Dword),
                ("HKCU", Some("b"), RegistryDataType::Dword),
                ("HKCU", None, RegistryDataType::Sz),
                ("HKLM", Some(""), RegistryDataType::Binary),
            ]
        );
        assert_eq!(entries[1].value(), &RegistryValue::Dword("2".to_string()));
    }

    #[test]
    fn default_key_serializes_as_null() {
        let mut keys = LegacyKeys::new();
        keys.push(None, vec![LegacyValue::untyped("7")]);
        let entries = flatten_registry(&[hive("HKLM", keys)]).unwrap();
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert!(json["keyName"].is_null());
        assert_eq!(json["dataType"], "DWORD");
        assert_eq!(json["value"], "7");
    }

    #[test]
    fn shape_mismatches_are_reported() {
        let mut keys = LegacyKeys::new();
        keys.push(
            Some("k".to_string()),
            vec![
                LegacyValue::text("REG_MULTI_SZ", "a"),
                LegacyValue::text("REG_QWORD", "1"),
                LegacyValue::untyped("ok"),
                LegacyValue {
                    data_type: Some("REG_DWORD".to_string()),
                    ..LegacyValue::multi_sz(["1"])
                },
            ],
        );
        let report = flatten_registry(&[hive("HKLM", keys)]).unwrap_err();
        let indices: Vec<usize> = report
            .errors()
            .iter()
            .map(|error| match error {
                NormalizeError::InvalidRegistryValueShape { index, .. } => *index,
                other => panic!("unexpected error: {}", other),
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 3]);
    }

    #[test]
    fn numeric_data_is_a_dword() {
        let number = |data_type: Option<&str>, number: u64| LegacyValue {
            data_type: data_type.map(str::to_string),
            value: LegacyValueData::Number(number),
        };
        let mut keys = LegacyKeys::new();
        keys.push(
            Some("n".to_string()),
            vec![
                number(None, 12),
                number(Some("REG_DWORD"), 4_294_967_295),
                number(None, 4_294_967_296),
                number(Some("REG_SZ"), 1),
                LegacyValue {
                    data_type: None,
                    value: LegacyValueData::Unrecognized(UnrecognizedData),
                },
            ],
        );
        let mut errors = Vec::new();
        let entries = collect_registry(&[hive("HKLM", keys)], &mut errors);
        let values: Vec<&RegistryValue> =
            entries.iter().map(|entry| entry.value()).collect();
        assert_eq!(
            values,
            vec![
                &RegistryValue::Dword("12".to_string()),
                &RegistryValue::Dword("4294967295".to_string()),
            ]
        );
        let details: Vec<(usize, &str)> = errors
            .iter()
            .map(|error| match error {
                NormalizeError::InvalidRegistryValueShape {
                    index, detail, ..
                } => (*index, detail.as_str()),
                other => panic!("unexpected error: {}", other),
            })
            .collect();
        assert_eq!(
            details,
            vec![
                (2, "DWORD data 4294967296 does not fit in 32 bits"),
                (3, "SZ data must be a single string"),
                (4, "DWORD data must be a single string"),
            ]
        );
    }

    #[test]
    fn data_type_names() {
        assert_eq!(
            RegistryDataType::from_name("REG_MULTI_SZ"),
            Some(RegistryDataType::MultiSz)
        );
        assert_eq!(
            RegistryDataType::from_name("DWORD"),
            Some(RegistryDataType::Dword)
        );
        assert_eq!(RegistryDataType::from_name("reg_sz"), None);
        assert_eq!(RegistryDataType::from_name("REG_"), None);
    }
}
