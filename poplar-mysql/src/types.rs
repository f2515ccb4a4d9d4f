//! Parameter conversions for MySQL.

use mysql_async::{Params, Value};

/// Convert a [`poplar_core::Value`] to a MySQL value.
pub fn value_to_mysql(value: &poplar_core::Value) -> Value {
    use poplar_core::Value as V;

    match value {
        V::Null => Value::NULL,
        V::Bool(b) => Value::from(*b),
        V::Int(i) => Value::from(*i),
        V::Float(f) => Value::from(*f),
        V::String(s) => Value::from(s.as_str()),
        V::Json(j) => Value::from(j.to_string()),
    }
}

/// Convert values to positional statement parameters.
pub fn values_to_params(values: &[poplar_core::Value]) -> Params {
    if values.is_empty() {
        Params::Empty
    } else {
        Params::Positional(values.iter().map(value_to_mysql).collect())
    }
}
