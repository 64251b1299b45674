use crate::db::Row;
use crate::error::StoreError;
use serde_json::{Map, Value};

/// 对一关联在行中的形态
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelationShape<'a> {
    /// `{ "name": ... }`
    Object(&'a Map<String, Value>),
    /// `[{ "name": ... }]`
    Singleton(&'a Map<String, Value>),
}

impl<'a> RelationShape<'a> {
    pub fn detect(value: &'a Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(RelationShape::Object(map)),
            Value::Array(items) => match items.as_slice() {
                [Value::Object(map)] => Ok(RelationShape::Singleton(map)),
                _ => Err(StoreError::Shape(format!(
                    "to-one relation returned {} elements",
                    items.len()
                ))),
            },
            other => Err(StoreError::Shape(format!(
                "to-one relation returned {other}"
            ))),
        }
    }

    pub fn fields(&self) -> &'a Map<String, Value> {
        match self {
            RelationShape::Object(map) | RelationShape::Singleton(map) => map,
        }
    }
}

/// 把行中名为 `relation` 的对一关联平铺到行本身
///
/// 两种形态得到的结果完全一致; 行中已有的同名字段不会被覆盖。
pub fn flatten_relation(mut row: Row, relation: &str) -> Result<Row, StoreError> {
    let value = row
        .remove(relation)
        .ok_or_else(|| StoreError::Shape(format!("row has no `{relation}` relation")))?;

    let shape = RelationShape::detect(&value)?;
    for (key, field) in shape.fields() {
        row.entry(key.clone()).or_insert_with(|| field.clone());
    }
    Ok(row)
}
