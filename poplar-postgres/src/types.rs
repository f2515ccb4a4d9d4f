//! Parameter conversions for PostgreSQL.

use poplar_core::Value;
use tokio_postgres::types::ToSql;

/// Convert a [`Value`] into a PostgreSQL parameter.
pub fn value_to_sql(value: &Value) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Int(i) => Box::new(*i),
        Value::Float(f) => Box::new(*f),
        Value::String(s) => Box::new(s.clone()),
        Value::Json(j) => Box::new(j.clone()),
    }
}

/// Convert values into PostgreSQL parameters.
pub fn values_to_params(values: &[Value]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    values.iter().map(value_to_sql).collect()
}
