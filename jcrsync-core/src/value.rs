//! Typed property values
//!
//! Every property carries exactly one of ten type tags. A value encodes to a
//! locale-independent payload string and decodes back from `(tag, payload)`:
//!
//! - scalars render as plain text (`42`, `1.5`, `true`, RFC 3339 dates)
//! - arrays render as `[a,b,c]`, with `\,` and `\\` escaping inside elements
//!
//! Descriptor attributes prefix the payload with the element type, e.g.
//! `{Long}[1,2,3]`; see [`TypedValue::to_attribute`].

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while decoding a property value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Unsupported property type: {0}")]
    UnsupportedType(String),

    #[error("Invalid {ty} value '{text}': {reason}")]
    InvalidValue {
        ty: PropertyType,
        text: String,
        reason: String,
    },
}

/// The closed set of property types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Long,
    Double,
    Boolean,
    Date,
    StringArray,
    LongArray,
    DoubleArray,
    BooleanArray,
    DateArray,
}

impl PropertyType {
    /// All supported types, scalars first
    pub const ALL: [PropertyType; 10] = [
        PropertyType::String,
        PropertyType::Long,
        PropertyType::Double,
        PropertyType::Boolean,
        PropertyType::Date,
        PropertyType::StringArray,
        PropertyType::LongArray,
        PropertyType::DoubleArray,
        PropertyType::BooleanArray,
        PropertyType::DateArray,
    ];

    /// Canonical tag of this type
    pub fn tag(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Boolean => "Boolean",
            PropertyType::Date => "Date",
            PropertyType::StringArray => "String[]",
            PropertyType::LongArray => "Long[]",
            PropertyType::DoubleArray => "Double[]",
            PropertyType::BooleanArray => "Boolean[]",
            PropertyType::DateArray => "Date[]",
        }
    }

    /// Look up a type by its tag
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.tag() == tag)
            .ok_or_else(|| CodecError::UnsupportedType(tag.to_string()))
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            PropertyType::StringArray
                | PropertyType::LongArray
                | PropertyType::DoubleArray
                | PropertyType::BooleanArray
                | PropertyType::DateArray
        )
    }

    /// Scalar type of the elements (identity for scalars)
    pub fn element_type(&self) -> PropertyType {
        match self {
            PropertyType::StringArray => PropertyType::String,
            PropertyType::LongArray => PropertyType::Long,
            PropertyType::DoubleArray => PropertyType::Double,
            PropertyType::BooleanArray => PropertyType::Boolean,
            PropertyType::DateArray => PropertyType::Date,
            scalar => *scalar,
        }
    }

    /// Array type with this element type (identity for arrays)
    pub fn array_type(&self) -> PropertyType {
        match self {
            PropertyType::String => PropertyType::StringArray,
            PropertyType::Long => PropertyType::LongArray,
            PropertyType::Double => PropertyType::DoubleArray,
            PropertyType::Boolean => PropertyType::BooleanArray,
            PropertyType::Date => PropertyType::DateArray,
            array => *array,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A property value together with its type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
    StringArray(Vec<String>),
    LongArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    BooleanArray(Vec<bool>),
    DateArray(Vec<DateTime<FixedOffset>>),
}

impl TypedValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            TypedValue::String(_) => PropertyType::String,
            TypedValue::Long(_) => PropertyType::Long,
            TypedValue::Double(_) => PropertyType::Double,
            TypedValue::Boolean(_) => PropertyType::Boolean,
            TypedValue::Date(_) => PropertyType::Date,
            TypedValue::StringArray(_) => PropertyType::StringArray,
            TypedValue::LongArray(_) => PropertyType::LongArray,
            TypedValue::DoubleArray(_) => PropertyType::DoubleArray,
            TypedValue::BooleanArray(_) => PropertyType::BooleanArray,
            TypedValue::DateArray(_) => PropertyType::DateArray,
        }
    }

    /// Canonical tag of this value's type
    pub fn tag(&self) -> &'static str {
        self.property_type().tag()
    }

    /// Render the payload text of this value
    pub fn encode(&self) -> String {
        match self {
            TypedValue::String(s) => s.clone(),
            TypedValue::Long(v) => v.to_string(),
            TypedValue::Double(v) => v.to_string(),
            TypedValue::Boolean(v) => v.to_string(),
            TypedValue::Date(v) => encode_date(v),
            TypedValue::StringArray(vs) => encode_array(vs.iter().cloned()),
            TypedValue::LongArray(vs) => encode_array(vs.iter().map(|v| v.to_string())),
            TypedValue::DoubleArray(vs) => encode_array(vs.iter().map(|v| v.to_string())),
            TypedValue::BooleanArray(vs) => encode_array(vs.iter().map(|v| v.to_string())),
            TypedValue::DateArray(vs) => encode_array(vs.iter().map(encode_date)),
        }
    }

    /// Decode a payload produced by [`TypedValue::encode`] for the given tag
    pub fn decode(tag: &str, text: &str) -> Result<Self> {
        Self::decode_as(PropertyType::from_tag(tag)?, text)
    }

    /// Decode a payload for an already resolved type
    pub fn decode_as(ty: PropertyType, text: &str) -> Result<Self> {
        let value = match ty {
            PropertyType::String => TypedValue::String(text.to_string()),
            PropertyType::Long => TypedValue::Long(decode_long(text)?),
            PropertyType::Double => TypedValue::Double(decode_double(text)?),
            PropertyType::Boolean => TypedValue::Boolean(decode_boolean(text)?),
            PropertyType::Date => TypedValue::Date(decode_date(text)?),
            PropertyType::StringArray => TypedValue::StringArray(split_array(text)),
            PropertyType::LongArray => TypedValue::LongArray(
                split_array(text).iter().map(|e| decode_long(e)).collect::<Result<_>>()?,
            ),
            PropertyType::DoubleArray => TypedValue::DoubleArray(
                split_array(text).iter().map(|e| decode_double(e)).collect::<Result<_>>()?,
            ),
            PropertyType::BooleanArray => TypedValue::BooleanArray(
                split_array(text).iter().map(|e| decode_boolean(e)).collect::<Result<_>>()?,
            ),
            PropertyType::DateArray => TypedValue::DateArray(
                split_array(text).iter().map(|e| decode_date(e)).collect::<Result<_>>()?,
            ),
        };
        Ok(value)
    }

    /// Render this value as a descriptor attribute: `{Type}payload`.
    ///
    /// Arrays use the element type in the prefix (`{Date}[...]`). A scalar
    /// payload starting with `[` or `\` is escaped with a leading `\` so it
    /// does not read back as an array.
    pub fn to_attribute(&self) -> String {
        let payload = self.encode();
        let ty = self.property_type();
        if !ty.is_array() && (payload.starts_with('[') || payload.starts_with('\\')) {
            format!("{{{}}}\\{}", ty.element_type().tag(), payload)
        } else {
            format!("{{{}}}{}", ty.element_type().tag(), payload)
        }
    }

    /// Parse a descriptor attribute value.
    ///
    /// Without a `{Type}` prefix the value is a `String`, or a `String[]`
    /// when bracketed. A prefix outside the known tags fails with
    /// [`CodecError::UnsupportedType`].
    pub fn parse_attribute(raw: &str) -> Result<Self> {
        if let Some(escaped) = raw.strip_prefix('\\') {
            return Ok(TypedValue::String(escaped.to_string()));
        }

        let (declared, payload) = match raw.strip_prefix('{').and_then(|r| r.split_once('}')) {
            Some((tag, rest)) => (Some(PropertyType::from_tag(tag)?), rest),
            None => (None, raw),
        };
        let base = declared.unwrap_or(PropertyType::String);

        if let Some(escaped) = payload.strip_prefix('\\') {
            if !base.is_array() {
                return Self::decode_as(base, escaped);
            }
        }
        if base.is_array() || (payload.starts_with('[') && payload.ends_with(']')) {
            return Self::decode_as(base.array_type(), payload);
        }
        Self::decode_as(base, payload)
    }

    /// String form of each value, for reading name lists such as mixins
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            TypedValue::StringArray(vs) => vs.clone(),
            TypedValue::String(s) => vec![s.clone()],
            other => match other.encode() {
                encoded if other.property_type().is_array() => split_array(&encoded),
                encoded => vec![encoded],
            },
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_attribute())
    }
}

fn encode_date(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn decode_long(text: &str) -> Result<i64> {
    text.trim().parse::<i64>().map_err(|e| invalid(PropertyType::Long, text, e))
}

fn decode_double(text: &str) -> Result<f64> {
    text.trim().parse::<f64>().map_err(|e| invalid(PropertyType::Double, text, e))
}

fn decode_boolean(text: &str) -> Result<bool> {
    match text.trim() {
        t if t.eq_ignore_ascii_case("true") => Ok(true),
        t if t.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(invalid(PropertyType::Boolean, text, "expected true or false")),
    }
}

fn decode_date(text: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text.trim()).map_err(|e| invalid(PropertyType::Date, text, e))
}

fn invalid(ty: PropertyType, text: &str, reason: impl fmt::Display) -> CodecError {
    CodecError::InvalidValue {
        ty,
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

fn encode_array<I: Iterator<Item = String>>(elements: I) -> String {
    let elements: Vec<String> = elements.collect();
    // `[]` is the empty array, so a lone empty element needs a marker
    if elements.len() == 1 && elements[0].is_empty() {
        return "[\\]".to_string();
    }
    let escaped: Vec<String> = elements
        .iter()
        .map(|e| e.replace('\\', "\\\\").replace(',', "\\,"))
        .collect();
    format!("[{}]", escaped.join(","))
}

/// Split an array payload into its unescaped elements.
///
/// Surrounding brackets are optional. A dangling `\` contributes nothing.
fn split_array(text: &str) -> Vec<String> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    if inner.is_empty() {
        return Vec::new();
    }

    let mut elements = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => elements.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    elements.push(current);
    elements
}
