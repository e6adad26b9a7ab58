//! Typed instance values
//!
//! Provides [`ValueType`] (the type tag carried by schema objects) and
//! [`Value`] (a parsed instance value). Values travel as text in snapshots
//! and are parsed under the object's type before reaching the backend.

use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Value type of a schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Object carries no value
    #[default]
    None,
    /// `true` / `false`
    Bool,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    Uint8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    Uint16,
    /// Signed 32-bit integer (also spelled `integer`)
    Int32,
    /// Unsigned 32-bit integer
    Uint32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    Uint64,
    /// Free text
    String,
    /// Network or link-layer address
    Address,
}

impl ValueType {
    /// All supported types
    pub const ALL: [Self; 12] = [
        Self::None,
        Self::Bool,
        Self::Int8,
        Self::Uint8,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Int64,
        Self::Uint64,
        Self::String,
        Self::Address,
    ];

    /// Canonical type name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::String => "string",
            Self::Address => "address",
        }
    }

    /// Check if instances of this type carry a value
    #[inline]
    #[must_use]
    pub fn has_value(self) -> bool {
        self != Self::None
    }

    /// Parse text under this type
    ///
    /// # Errors
    /// Returns [`ValueError::Unexpected`] for [`ValueType::None`] and
    /// [`ValueError::Invalid`] when the text does not fit the type.
    pub fn parse(self, text: &str) -> Result<Value, ValueError> {
        let invalid = |reason: String| ValueError::Invalid {
            ty: self,
            text: text.to_string(),
            reason,
        };
        let value = match self {
            Self::None => return Err(ValueError::Unexpected { ty: self }),
            Self::Bool => match text {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(invalid("expected true or false".to_string())),
            },
            Self::Int8 => Value::Int8(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::Uint8 => Value::Uint8(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::Int16 => Value::Int16(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::Uint16 => Value::Uint16(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::Int32 => Value::Int32(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::Uint32 => Value::Uint32(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::Int64 => Value::Int64(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::Uint64 => Value::Uint64(text.parse().map_err(|e| invalid(format!("{e}")))?),
            Self::String => Value::String(text.to_string()),
            Self::Address => Value::Address(text.parse().map_err(invalid)?),
        };
        Ok(value)
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "integer" {
            return Ok(Self::Int32);
        }
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ValueError::UnknownType(s.to_string()))
    }
}

/// Parsed instance value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed 8-bit integer
    Int8(i8),
    /// Unsigned 8-bit integer
    Uint8(u8),
    /// Signed 16-bit integer
    Int16(i16),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Text
    String(String),
    /// Address
    Address(Address),
}

impl Value {
    /// Type tag of this value
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int8(_) => ValueType::Int8,
            Self::Uint8(_) => ValueType::Uint8,
            Self::Int16(_) => ValueType::Int16,
            Self::Uint16(_) => ValueType::Uint16,
            Self::Int32(_) => ValueType::Int32,
            Self::Uint32(_) => ValueType::Uint32,
            Self::Int64(_) => ValueType::Int64,
            Self::Uint64(_) => ValueType::Uint64,
            Self::String(_) => ValueType::String,
            Self::Address(_) => ValueType::Address,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Uint16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Uint64(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Address(v) => write!(f, "{v}"),
        }
    }
}

/// Network or link-layer address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// IPv4 or IPv6 address
    Ip(IpAddr),
    /// 48-bit hardware address
    Mac([u8; 6]),
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Mac(bytes) => {
                let [a, b, c, d, e, g] = bytes;
                write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
            }
        }
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Ip(ip));
        }
        let octets: Vec<&str> = s.split(':').collect();
        if octets.len() != 6 {
            return Err("expected an IP or a hardware address".to_string());
        }
        let mut bytes = [0u8; 6];
        for (byte, octet) in bytes.iter_mut().zip(octets) {
            if octet.is_empty() || octet.len() > 2 {
                return Err(format!("bad hardware address octet '{octet}'"));
            }
            *byte = u8::from_str_radix(octet, 16)
                .map_err(|e| format!("bad hardware address octet '{octet}': {e}"))?;
        }
        Ok(Self::Mac(bytes))
    }
}

/// Value conversion failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Type name not recognised
    #[error("unsupported value type '{0}'")]
    UnknownType(String),

    /// Typed object without a value
    #[error("value is missing")]
    Missing,

    /// Value given for an object that carries none
    #[error("objects of type {ty} carry no value")]
    Unexpected { ty: ValueType },

    /// Text does not fit the type
    #[error("'{text}' is not a valid {ty}: {reason}")]
    Invalid {
        ty: ValueType,
        text: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for ty in ValueType::ALL {
            assert_eq!(ty.as_str().parse::<ValueType>().unwrap(), ty);
        }
        assert_eq!("integer".parse::<ValueType>().unwrap(), ValueType::Int32);
        assert!(matches!(
            "float".parse::<ValueType>(),
            Err(ValueError::UnknownType(_))
        ));
    }

    #[test]
    fn integers_respect_width() {
        assert_eq!(ValueType::Int8.parse("-128").unwrap(), Value::Int8(-128));
        assert!(ValueType::Int8.parse("128").is_err());
        assert!(ValueType::Uint16.parse("-1").is_err());
        assert_eq!(
            ValueType::Uint64.parse("18446744073709551615").unwrap(),
            Value::Uint64(u64::MAX)
        );
    }

    #[test]
    fn bool_spellings() {
        assert_eq!(ValueType::Bool.parse("1").unwrap(), Value::Bool(true));
        assert_eq!(ValueType::Bool.parse("false").unwrap(), Value::Bool(false));
        assert!(ValueType::Bool.parse("yes").is_err());
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn none_takes_no_value() {
        assert_eq!(
            ValueType::None.parse("x"),
            Err(ValueError::Unexpected { ty: ValueType::None })
        );
        assert!(!ValueType::None.has_value());
    }

    #[test]
    fn addresses() {
        let ip = ValueType::Address.parse("10.0.0.1").unwrap();
        assert_eq!(ip.to_string(), "10.0.0.1");
        let v6 = ValueType::Address.parse("fe80::1").unwrap();
        assert_eq!(v6.to_string(), "fe80::1");
        let mac = ValueType::Address.parse("00:1A:2b:3c:4d:5e").unwrap();
        assert_eq!(mac.to_string(), "00:1a:2b:3c:4d:5e");
        assert!(ValueType::Address.parse("00:1a:2b").is_err());
    }

    #[test]
    fn display_reparses_to_same_value() {
        let value = ValueType::Int32.parse("0042").unwrap();
        assert_eq!(value.to_string(), "42");
        assert_eq!(ValueType::Int32.parse(&value.to_string()).unwrap(), value);
        assert_eq!(value.value_type(), ValueType::Int32);
    }
}
