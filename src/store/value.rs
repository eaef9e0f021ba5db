//! Strongly typed values held by the state store.
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data type of a stored value.
///
/// Mirrors the registry value kinds; the file backend only stores
/// [`ValueKind::Binary`] content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// `REG_SZ`.
    String,
    /// `REG_EXPAND_SZ`.
    ExpandString,
    /// `REG_BINARY`, or raw file content.
    Binary,
    /// `REG_DWORD` (32-bit unsigned).
    Dword,
    /// `REG_MULTI_SZ`.
    MultiString,
    /// `REG_QWORD` (64-bit unsigned).
    Qword,
}

impl ValueKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::ExpandString => "expand-string",
            Self::Binary => "binary",
            Self::Dword => "dword",
            Self::MultiString => "multi-string",
            Self::Qword => "qword",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value read from or written to the state store.
///
/// Serialized in the adjacently tagged form
/// `{ "type": "dword", "data": 1 }`; binary data is base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Value {
    /// Plain string.
    String(String),
    /// String containing unexpanded environment references.
    ExpandString(String),
    /// Raw bytes.
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
    /// 32-bit unsigned integer.
    Dword(u32),
    /// Ordered list of strings.
    MultiString(Vec<String>),
    /// 64-bit unsigned integer.
    Qword(u64),
}

/// Template data that cannot be mapped onto a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UnsupportedData(pub String);

impl Value {
    /// The [`ValueKind`] of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::ExpandString(_) => ValueKind::ExpandString,
            Self::Binary(_) => ValueKind::Binary,
            Self::Dword(_) => ValueKind::Dword,
            Self::MultiString(_) => ValueKind::MultiString,
            Self::Qword(_) => ValueKind::Qword,
        }
    }

    /// Convert template data into a typed value.
    ///
    /// Accepts the explicit `{ "type": ..., "data": ... }` form as well as
    /// shorthand: strings become [`Value::String`], booleans a `0`/`1`
    /// [`Value::Dword`], integers a dword (or qword when they exceed
    /// 32 bits), and string arrays a [`Value::MultiString`]. `null` means
    /// "capture whatever is present" and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedData`] for negative or fractional numbers, mixed
    /// arrays, and malformed explicit objects.
    pub fn from_template_data(data: &serde_json::Value) -> Result<Option<Self>, UnsupportedData> {
        use serde_json::Value as Json;

        match data {
            Json::Null => Ok(None),
            Json::String(s) => Ok(Some(Self::String(s.clone()))),
            Json::Bool(b) => Ok(Some(Self::Dword(u32::from(*b)))),
            Json::Number(n) => {
                let n = n
                    .as_u64()
                    .ok_or_else(|| UnsupportedData(format!("'{n}' is not an unsigned integer")))?;
                Ok(Some(u32::try_from(n).map_or(Self::Qword(n), Self::Dword)))
            }
            Json::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        UnsupportedData("multi-string arrays may only contain strings".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|strings| Some(Self::MultiString(strings))),
            Json::Object(_) => serde_json::from_value::<Self>(data.clone())
                .map(Some)
                .map_err(|e| UnsupportedData(format!("invalid typed value: {e}"))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::ExpandString(s) => write!(f, "{s}"),
            Self::Binary(bytes) => write!(f, "{}", STANDARD.encode(bytes)),
            Self::Dword(n) => write!(f, "{n}"),
            Self::Qword(n) => write!(f, "{n}"),
            Self::MultiString(items) => write!(f, "{}", items.join(";")),
        }
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize as _, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)] // signature required by `#[serde(with)]`
    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
