//! Shaped value tree handed to template renderers.
//!
//! Both shaping backends produce a [`Value`]: scalar leaves, objects keyed by
//! property name, and ordered lists of objects for collections. Renderers only
//! see this tree (or its JSON form), never where it came from.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A single decoded column value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Key used to group rows that describe the same entity.
    ///
    /// `None` for NULL: a NULL identifier never identifies an item.
    pub fn identity_key(&self) -> Option<String> {
        let key = match self {
            Self::Null => return None,
            Self::Bool(v) => format!("b:{v}"),
            Self::Int(v) => format!("i:{v}"),
            Self::Float(v) => format!("f:{}", v.to_bits()),
            Self::Decimal(v) => format!("d:{}", v.normalize()),
            Self::Text(v) => format!("t:{v}"),
            // Ids decoded from different column types still compare equal.
            Self::Uuid(v) => format!("t:{v}"),
            Self::Date(v) => format!("D:{v}"),
            Self::DateTime(v) => format!("T:{v}"),
            Self::DateTimeTz(v) => format!("Z:{}", v.to_rfc3339()),
            Self::Json(v) => format!("j:{v}"),
        };
        Some(key)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<Decimal> for Scalar {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Scalar {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// The shaped object tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Object(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    /// An empty object.
    pub fn object() -> Self {
        Self::Object(BTreeMap::new())
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Property lookup on an object; `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Follow a dotted property path through nested objects.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |current, key| current.get(key))
    }

    /// Convert into plain JSON for renderers that take `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        // Every variant serialises to JSON; failure would be a serde bug.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

/// Identifier of a root entity, bound as the single query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntityId {
    Uuid(Uuid),
    Int(i64),
    Text(String),
}

impl EntityId {
    pub fn to_scalar(&self) -> Scalar {
        match self {
            Self::Uuid(v) => Scalar::Uuid(*v),
            Self::Int(v) => Scalar::Int(*v),
            Self::Text(v) => Scalar::Text(v.clone()),
        }
    }

    /// Use a decoded key column as an identifier for a follow-up query.
    pub fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Uuid(v) => Some(Self::Uuid(*v)),
            Scalar::Int(v) => Some(Self::Int(*v)),
            Scalar::Text(v) => Some(Self::Text(v.clone())),
            _ => None,
        }
    }

    fn accepts_type(&self, ty: &Type) -> bool {
        match self {
            Self::Uuid(_) => *ty == Type::UUID,
            Self::Int(_) => *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8,
            Self::Text(_) => <&str as ToSql>::accepts(ty),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    /// UUID first, then integer, otherwise text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(v) = Uuid::parse_str(s) {
            return Ok(Self::Uuid(v));
        }
        if let Ok(v) = s.parse::<i64>() {
            return Ok(Self::Int(v));
        }
        Ok(Self::Text(s.to_string()))
    }
}

impl From<Uuid> for EntityId {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<i64> for EntityId {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for EntityId {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl ToSql for EntityId {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        if !self.accepts_type(ty) {
            return Err(format!("cannot bind identifier {self} to a column of type {ty}").into());
        }
        match self {
            Self::Uuid(v) => v.to_sql(ty, out),
            Self::Int(v) if *ty == Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
            Self::Int(v) if *ty == Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
            Self::Int(v) => v.to_sql(ty, out),
            Self::Text(v) => v.as_str().to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::UUID
            || *ty == Type::INT2
            || *ty == Type::INT4
            || *ty == Type::INT8
            || <&str as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}
