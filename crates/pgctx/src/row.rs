//! Flat result rows and column decoding.
//!
//! A [`FlatRow`] is what the executor hands to the flat shaper: result column
//! aliases in SELECT order, each decoded into a [`Scalar`] by its PostgreSQL type.

use crate::error::{CtxError, CtxResult};
use crate::value::Scalar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tokio_postgres::types::Type;
use uuid::Uuid;

/// One result row keyed by column alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRow {
    columns: Vec<(String, Scalar)>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column, replacing an earlier value under the same alias.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Decode every column of a driver row.
    pub fn from_row(row: &Row) -> CtxResult<Self> {
        let columns = row
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| Ok((col.name().to_string(), decode_column(row, idx)?)))
            .collect::<CtxResult<Vec<_>>>()?;
        Ok(Self { columns })
    }
}

/// Decode column `idx` of `row` by its PostgreSQL type. SQL NULL becomes [`Scalar::Null`].
pub fn decode_column(row: &Row, idx: usize) -> CtxResult<Scalar> {
    let column = &row.columns()[idx];
    let ty = column.type_();
    let err = |e: tokio_postgres::Error| CtxError::decode(column.name(), e.to_string());

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map_err(err)?.map(Scalar::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map_err(err)?
            .map(|v| Scalar::Int(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map_err(err)?
            .map(|v| Scalar::Int(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map_err(err)?.map(Scalar::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map_err(err)?
            .map(|v| Scalar::Float(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).map_err(err)?.map(Scalar::Float)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx)
            .map_err(err)?
            .map(Scalar::Decimal)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx).map_err(err)?.map(Scalar::Text)
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<Uuid>>(idx).map_err(err)?.map(Scalar::Uuid)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)
            .map_err(err)?
            .map(Scalar::Date)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(err)?
            .map(Scalar::DateTime)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(err)?
            .map(Scalar::DateTimeTz)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(err)?
            .map(Scalar::Json)
    } else {
        return Err(CtxError::decode(
            column.name(),
            format!("unsupported column type {ty}"),
        ));
    };

    Ok(value.unwrap_or(Scalar::Null))
}
