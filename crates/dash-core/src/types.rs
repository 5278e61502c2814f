//! Scalar cell values read out of result columns

use crate::error::{DashError, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of a result table.
///
/// Integer widths collapse to `Int64`/`UInt64`, floats to `Float64`.
/// Warehouse `NUMBER` columns usually arrive as Arrow decimals and keep their
/// scale. Types without a dedicated variant (dates, timestamps, ...) are
/// carried as their display string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Decimal { value: i128, scale: i8 },
    Utf8(String),
}

impl ScalarValue {
    /// Read the value at `row` of an Arrow array
    pub fn from_array(array: &dyn Array, row: usize) -> Result<Self> {
        if row >= array.len() {
            return Err(DashError::Schema(format!(
                "row {} out of bounds for column of length {}",
                row,
                array.len()
            )));
        }
        if array.is_null(row) {
            return Ok(ScalarValue::Null);
        }

        let value = match array.data_type() {
            DataType::Boolean => ScalarValue::Boolean(array.as_boolean().value(row)),
            DataType::Int8 => ScalarValue::Int64(array.as_primitive::<Int8Type>().value(row) as i64),
            DataType::Int16 => {
                ScalarValue::Int64(array.as_primitive::<Int16Type>().value(row) as i64)
            }
            DataType::Int32 => {
                ScalarValue::Int64(array.as_primitive::<Int32Type>().value(row) as i64)
            }
            DataType::Int64 => ScalarValue::Int64(array.as_primitive::<Int64Type>().value(row)),
            DataType::UInt8 => {
                ScalarValue::UInt64(array.as_primitive::<UInt8Type>().value(row) as u64)
            }
            DataType::UInt16 => {
                ScalarValue::UInt64(array.as_primitive::<UInt16Type>().value(row) as u64)
            }
            DataType::UInt32 => {
                ScalarValue::UInt64(array.as_primitive::<UInt32Type>().value(row) as u64)
            }
            DataType::UInt64 => ScalarValue::UInt64(array.as_primitive::<UInt64Type>().value(row)),
            DataType::Float32 => {
                ScalarValue::Float64(array.as_primitive::<Float32Type>().value(row) as f64)
            }
            DataType::Float64 => {
                ScalarValue::Float64(array.as_primitive::<Float64Type>().value(row))
            }
            DataType::Decimal128(_, scale) => ScalarValue::Decimal {
                value: array.as_primitive::<Decimal128Type>().value(row),
                scale: *scale,
            },
            DataType::Utf8 => ScalarValue::Utf8(array.as_string::<i32>().value(row).to_string()),
            DataType::LargeUtf8 => {
                ScalarValue::Utf8(array.as_string::<i64>().value(row).to_string())
            }
            _ => {
                let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
                ScalarValue::Utf8(formatter.value(row).to_string())
            }
        };

        Ok(value)
    }

    /// Numeric view of the value. Strings are parsed; anything that is not a
    /// number yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Null => None,
            ScalarValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScalarValue::Int64(v) => Some(*v as f64),
            ScalarValue::UInt64(v) => Some(*v as f64),
            ScalarValue::Float64(v) => Some(*v),
            ScalarValue::Decimal { value, scale } => {
                Some(*value as f64 / 10f64.powi(*scale as i32))
            }
            ScalarValue::Utf8(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Integer view of the value, truncating fractional parts.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int64(v) => Some(*v),
            ScalarValue::UInt64(v) => i64::try_from(*v).ok(),
            ScalarValue::Utf8(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| self.as_f64().map(|f| f as i64)),
            other => other.as_f64().map(|f| f as i64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Utf8(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::UInt64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Decimal { value, scale } => write!(f, "{}", format_decimal(*value, *scale)),
            ScalarValue::Utf8(s) => write!(f, "{}", s),
        }
    }
}

fn format_decimal(value: i128, scale: i8) -> String {
    if scale <= 0 {
        return match 10i128
            .checked_pow(scale.unsigned_abs() as u32)
            .and_then(|factor| value.checked_mul(factor))
        {
            Some(v) => v.to_string(),
            None => format!("{}e{}", value, -(scale as i32)),
        };
    }

    let divisor = 10u128.pow(scale as u32);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / divisor,
        abs % divisor,
        width = scale as usize
    )
}
