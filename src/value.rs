//! Dynamic values at the query boundary.
//!
//! The query layer and the string DSL are untyped; each index is strongly
//! typed. `Value` is the sum of permitted literal kinds and `IndexKey` is the
//! checked down-cast an index performs at lookup time. The conversion is
//! strict: a `Value::I64` never matches a `u8`-keyed index, the caller has to
//! produce a `Value::U8` (the DSL does this with `uint8(..)` casts).

use std::cmp::Ordering;
use std::fmt;

use crate::error::Error;

/// A dynamically typed query literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Absent value; matches the `None` entries of an `Option`-keyed index.
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A type that can serve as an index key.
///
/// `cmp_key` is a total order even for floats (`total_cmp`), so every key
/// type works in the sorted index. The prefix hooks are only answered by
/// string-like keys; everything else reports no prefix support and the
/// sorted index turns that into an unsupported-operation error.
pub trait IndexKey: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Static name used in `InvalidValueType` messages.
    fn type_name() -> &'static str;

    /// Strict conversion from a query literal. `None` means type mismatch.
    fn from_value(value: &Value) -> Option<Self>;

    fn to_value(&self) -> Value;

    fn cmp_key(&self, other: &Self) -> Ordering;

    fn has_prefix(&self, _prefix: &str) -> bool {
        false
    }

    /// Smallest key that could carry the prefix, used to position a range
    /// scan. `None` means the key type has no prefix semantics.
    fn prefix_start(_prefix: &str) -> Option<Self> {
        None
    }
}

/// Checked down-cast with the crate error attached.
pub(crate) fn convert<K: IndexKey>(value: &Value) -> Result<K, Error> {
    K::from_value(value).ok_or(Error::InvalidValueType {
        expected: K::type_name(),
        got: value.type_name(),
    })
}

macro_rules! ordered_key {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {$(
        impl IndexKey for $ty {
            fn type_name() -> &'static str {
                $name
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn to_value(&self) -> Value {
                Value::$variant(*self)
            }

            fn cmp_key(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

ordered_key! {
    bool => Bool, "bool";
    i8 => I8, "i8";
    i16 => I16, "i16";
    i32 => I32, "i32";
    i64 => I64, "i64";
    u8 => U8, "u8";
    u16 => U16, "u16";
    u32 => U32, "u32";
    u64 => U64, "u64";
}

macro_rules! float_key {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {$(
        impl IndexKey for $ty {
            fn type_name() -> &'static str {
                $name
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn to_value(&self) -> Value {
                Value::$variant(*self)
            }

            fn cmp_key(&self, other: &Self) -> Ordering {
                self.total_cmp(other)
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

float_key! {
    f32 => F32, "f32";
    f64 => F64, "f64";
}

impl IndexKey for String {
    fn type_name() -> &'static str {
        "string"
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn cmp_key(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.starts_with(prefix)
    }

    fn prefix_start(prefix: &str) -> Option<Self> {
        Some(prefix.to_string())
    }
}

/// `None` sorts before every `Some` and round-trips through `Value::Null`.
/// This is how nullable record fields get indexed and how `IsNull` queries
/// find them.
impl<K: IndexKey> IndexKey for Option<K> {
    fn type_name() -> &'static str {
        K::type_name()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => K::from_value(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Some(k) => k.to_value(),
            None => Value::Null,
        }
    }

    fn cmp_key(&self, other: &Self) -> Ordering {
        match (self, other) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp_key(b),
        }
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.as_ref().is_some_and(|k| k.has_prefix(prefix))
    }

    fn prefix_start(prefix: &str) -> Option<Self> {
        K::prefix_start(prefix).map(Some)
    }
}

/// Marker key for lists created without a primary-key index. Converts from
/// no value, so every primary-key operation on such a list fails before it
/// can touch storage.
impl IndexKey for () {
    fn type_name() -> &'static str {
        "()"
    }

    fn from_value(_value: &Value) -> Option<Self> {
        None
    }

    fn to_value(&self) -> Value {
        Value::Null
    }

    fn cmp_key(&self, _other: &Self) -> Ordering {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_conversion() {
        assert_eq!(u8::from_value(&Value::U8(5)), Some(5));
        // an untyped integer literal never matches a u8 key
        assert_eq!(u8::from_value(&Value::I64(5)), None);
        assert_eq!(i64::from_value(&Value::U8(5)), None);
        assert_eq!(String::from_value(&Value::Str("x".into())), Some("x".into()));
        assert_eq!(String::from_value(&Value::Bool(true)), None);
    }

    #[test]
    fn test_convert_error() {
        let err = convert::<u8>(&Value::I64(5)).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidValueType {
                expected: "u8",
                got: "i64"
            }
        );
    }

    #[test]
    fn test_option_key() {
        assert_eq!(<Option<String>>::from_value(&Value::Null), Some(None));
        assert_eq!(
            <Option<String>>::from_value(&Value::Str("a".into())),
            Some(Some("a".to_string()))
        );
        assert_eq!(<Option<u8>>::from_value(&Value::Str("a".into())), None);

        // None sorts first
        let none: Option<u8> = None;
        assert_eq!(none.cmp_key(&Some(0)), Ordering::Less);
        assert_eq!(Some(1u8).cmp_key(&Some(2)), Ordering::Less);
    }

    #[test]
    fn test_float_total_order() {
        assert_eq!(1.0f64.cmp_key(&2.0), Ordering::Less);
        assert_eq!(f64::NAN.cmp_key(&f64::NAN), Ordering::Equal);
        assert_eq!((-0.0f64).cmp_key(&0.0), Ordering::Less);
    }

    #[test]
    fn test_prefix_hooks() {
        assert!("Mercedes".to_string().has_prefix("Merc"));
        assert!(!"Opel".to_string().has_prefix("Merc"));
        assert_eq!(String::prefix_start("Merc"), Some("Merc".to_string()));
        assert_eq!(u32::prefix_start("Merc"), None);
        assert!(!42u32.has_prefix("4"));
    }

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("x"), Value::Str("x".into()));
        assert_eq!(Value::from(5u8), Value::U8(5));
        assert_eq!(Value::from(Some(5u8)), Value::U8(5));
        assert_eq!(Value::from(None::<u8>), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Str("Dacia".into()).to_string(), "Dacia");
        assert_eq!(Value::U8(22).to_string(), "22");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
