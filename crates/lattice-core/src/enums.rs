//! Closed string-backed enums shared across the system.
//!
//! Each enum serializes as its wire string and exposes `as_str` plus a
//! fallible `parse`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! define_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident,
        variants: [
            $( ($variant:ident, $str:expr) ),+ $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            /// Returns the wire string.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }

            /// Parses the wire string, returning `None` for unknown values.
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $( $str => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).ok_or_else(|| {
                    serde::de::Error::unknown_variant(&s, &[$( $str ),+])
                })
            }
        }
    };
}

define_enum! {
    /// Whether and how field constraints gate ingestion.
    SchemaEnforcementMode, default = None,
    variants: [
        (None, "None"),
        (Soft, "Soft"),
        (Strict, "Strict"),
    ]
}

define_enum! {
    /// Which flattened keys of a collection are indexed.
    IndexingMode, default = All,
    variants: [
        (None, "None"),
        (All, "All"),
        (Selective, "Selective"),
    ]
}

define_enum! {
    /// Scalar datatype of a flattened JSON leaf.
    DataType, default = Null,
    variants: [
        (String, "string"),
        (Integer, "integer"),
        (Number, "number"),
        (Boolean, "boolean"),
        (Null, "null"),
    ]
}

impl DataType {
    /// Returns `true` for the two numeric datatypes.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}
