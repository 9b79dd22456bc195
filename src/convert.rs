//! Conversions between Rust field types and [`Value`].
//!
//! The derived field view calls [`ToValue::to_value`] for every field it
//! enumerates and [`FromValue::from_value`] for every field it assigns.
//! Implement both for your own field types to use them in derived structs.

use crate::error::{PickleError, Result};
use crate::object::TypeDescriptor;
use crate::value::{Callable, DictRef, Key, ListRef, ObjectRef, SetRef, Value};

/// Converts a field into a graph value.
pub trait ToValue {
    /// Returns the graph value. Shared handles are aliased, not copied.
    fn to_value(&self) -> Value;
}

/// Converts a restored graph value back into a field.
pub trait FromValue: Sized {
    /// Consumes the restored value.
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, found: &Value) -> PickleError {
    PickleError::TypeMismatch {
        expected,
        found: found.kind_name(),
    }
}

macro_rules! impl_integer {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(n) => <$t>::try_from(n).map_err(|_| PickleError::TypeMismatch {
                            expected: stringify!($t),
                            found: "out-of-range int",
                        }),
                        other => Err(mismatch(stringify!($t), &other)),
                    }
                }
            }
        )*
    }
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(x) => Ok(x),
            // Integral floats may come back from text as integers.
            Value::Int(n) => Ok(n as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("str", &other)),
        }
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl ToValue for Key {
    fn to_value(&self) -> Value {
        Key::to_value(self)
    }
}

impl FromValue for Key {
    fn from_value(value: Value) -> Result<Self> {
        Key::from_value(&value).ok_or_else(|| mismatch("key", &value))
    }
}

macro_rules! impl_handle {
    ($($t:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(mismatch($name, &other)),
                    }
                }
            }
        )*
    }
}

impl_handle! {
    ListRef => List, "list";
    DictRef => Dict, "dict";
    SetRef => Set, "set";
    ObjectRef => Object, "object";
    Callable => Function, "function";
    TypeDescriptor => Type, "type";
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A `Vec` field becomes a fresh list on every enumeration, so two `Vec`
/// fields never alias. Use [`ListRef`] for lists that must keep identity.
impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::list(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        let items: Vec<Value> = match &value {
            Value::List(list) => list.borrow().clone(),
            Value::Tuple(items) => items.to_vec(),
            other => return Err(mismatch("list", other)),
        };
        items.into_iter().map(T::from_value).collect()
    }
}
