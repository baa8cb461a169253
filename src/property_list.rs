//! Property-list reader.
//!
//! System utilities emit property lists in XML or binary encoding; the
//! `plist` crate detects either.  Values are converted into [`PlistValue`],
//! an owned tree that also serializes through serde for the inventory cache.
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BINARY_MAGIC: &[u8] = b"bplist";
const XML_PROLOGUES: [&[u8]; 3] = [b"<?xml", b"<!DOCTYPE plist", b"<plist"];
const PREVIEW_CHARS: usize = 40;

/// Errors raised while reading a property list.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input is plain text rather than a property list, e.g. a disk
    /// image's license agreement printed in place of the expected output.
    #[error("output is not a property list (starts with {preview:?})")]
    NotPropertyList {
        /// First characters of the input.
        preview: String,
    },

    /// The input claims to be a property list but cannot be decoded.
    #[error("malformed property list: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },

    /// The property list decoded but does not have the expected structure.
    #[error("unexpected property list structure: {0}")]
    UnexpectedShape(String),
}

impl ParseError {
    /// Whether this failure is the license-agreement kind that callers
    /// downgrade to an absent result.
    #[must_use]
    pub const fn is_eula_shaped(&self) -> bool {
        matches!(self, Self::NotPropertyList { .. })
    }
}

/// A decoded property-list value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlistValue {
    /// UTF-8 string.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point number (also holds unsigned values beyond `i64`).
    Real(f64),
    /// Boolean.
    Boolean(bool),
    /// Date, normalised to UTC.
    Date(DateTime<Utc>),
    /// Raw bytes.
    Data(Vec<u8>),
    /// Ordered sequence.
    Array(Vec<Self>),
    /// Mapping from string keys to values.
    Dictionary(BTreeMap<String, Self>),
}

impl PlistValue {
    /// The string content, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The entries, if this is a dictionary.
    #[must_use]
    pub const fn as_dictionary(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Dictionary(map) => Some(map),
            _ => None,
        }
    }

    /// Whether a string value contains `needle`, or an array holds such a string.
    ///
    /// Other value kinds never match.
    #[must_use]
    pub fn contains_text(&self, needle: &str) -> bool {
        match self {
            Self::String(s) => s.contains(needle),
            Self::Array(items) => items
                .iter()
                .any(|item| item.as_str().is_some_and(|s| s.contains(needle))),
            _ => false,
        }
    }

    /// Convert into plain JSON (dates as RFC 3339, data as byte arrays).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Real(r) => Value::from(*r),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Date(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Data(bytes) => Value::from(bytes.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Dictionary(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for PlistValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Data(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Array(_) | Self::Dictionary(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<plist::Value> for PlistValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: plist::Value) -> Self {
        match value {
            plist::Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            plist::Value::Dictionary(dict) => {
                Self::Dictionary(dict.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
            plist::Value::Boolean(b) => Self::Boolean(b),
            plist::Value::Data(bytes) => Self::Data(bytes),
            plist::Value::Date(date) => Self::Date(DateTime::<Utc>::from(SystemTime::from(date))),
            plist::Value::Real(r) => Self::Real(r),
            plist::Value::Integer(i) => match i.as_signed() {
                Some(n) => Self::Integer(n),
                None => {
                    // Only values above i64::MAX land here.
                    #[allow(clippy::cast_precision_loss)]
                    let r = i.as_unsigned().unwrap_or_default() as f64;
                    Self::Real(r)
                }
            },
            plist::Value::String(s) => Self::String(s),
            plist::Value::Uid(uid) => Self::Integer(i64::try_from(uid.get()).unwrap_or(i64::MAX)),
            other => Self::String(format!("{other:?}")),
        }
    }
}

/// Whether `bytes` begin like an XML or binary property list.
#[must_use]
pub fn looks_like_property_list(bytes: &[u8]) -> bool {
    let trimmed = trim_leading(bytes);
    trimmed.starts_with(BINARY_MAGIC) || XML_PROLOGUES.iter().any(|p| trimmed.starts_with(p))
}

/// Parse a property list in either encoding.
///
/// # Errors
///
/// Returns [`ParseError::NotPropertyList`] for plain-text input and
/// [`ParseError::Malformed`] for undecodable property lists.
pub fn read_property_list(bytes: &[u8]) -> Result<PlistValue, ParseError> {
    if !looks_like_property_list(bytes) {
        return Err(ParseError::NotPropertyList {
            preview: preview(bytes),
        });
    }
    plist::Value::from_reader(Cursor::new(bytes))
        .map(PlistValue::from)
        .map_err(|e| ParseError::Malformed {
            reason: e.to_string(),
        })
}

/// Parse a property list, treating license-agreement text as absent.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] for genuinely corrupt property lists.
pub fn read_optional_property_list(bytes: &[u8]) -> Result<Option<PlistValue>, ParseError> {
    match read_property_list(bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_eula_shaped() => Ok(None),
        Err(e) => Err(e),
    }
}

fn trim_leading(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes.get(start..).unwrap_or_default()
}

fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(trim_leading(bytes))
        .chars()
        .take(PREVIEW_CHARS)
        .collect()
}
