use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A value stored in a session.
///
/// Sessions hold a closed set of value types.
/// Application types are stored as [`Value::Structured`], see [`StructuredValue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A string.
    String(String),
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A byte sequence.
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// A point in time.
    Time(DateTime<Utc>),
    /// An application type, serialized to MessagePack and tagged with its [`StructuredValue::TYPE_TAG`].
    Structured {
        /// Identifies the application type the payload was serialized from.
        type_tag: String,
        /// The serialized value.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },
}

/// An application type that can be stored in a session.
///
/// The type tag is stored next to the value and checked on retrieval, so that reading a value as
/// the wrong type yields nothing instead of garbage. It must be unique among the types an
/// application stores, and should stay stable across deployments as long as old cookies are valid.
///
/// ```
/// use cookie_session::StructuredValue;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Cart {
///     items: Vec<u32>,
/// }
///
/// impl StructuredValue for Cart {
///     const TYPE_TAG: &'static str = "shop.cart";
/// }
/// ```
pub trait StructuredValue: Serialize + DeserializeOwned {
    /// The tag identifying this type.
    const TYPE_TAG: &'static str;
}

impl Value {
    /// Serialize an application type into a structured value.
    pub fn structured<T: StructuredValue>(value: &T) -> crate::Result<Self> {
        Ok(Self::Structured {
            type_tag: T::TYPE_TAG.to_owned(),
            payload: rmp_serde::to_vec(value)?,
        })
    }

    /// Deserialize a structured value into an application type.
    /// Returns `None` if this is not a structured value of type `T`.
    pub fn to_structured<T: StructuredValue>(&self) -> Option<T> {
        match self {
            Self::Structured { type_tag, payload } if type_tag == T::TYPE_TAG => {
                match rmp_serde::from_slice(payload) {
                    Ok(value) => Some(value),
                    Err(error) => {
                        log::warn!("Could not deserialize session value of type {type_tag}: {error}");
                        None
                    }
                }
            }
            _ => None,
        }
    }

    /// Returns the string if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the number if this is a [`Value::Float`].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`Value::Bytes`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the time if this is a [`Value::Time`].
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn into_string(self) -> Option<String> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}
