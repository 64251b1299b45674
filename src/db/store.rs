use crate::db::QuerySpec;
use crate::error::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// 数据源返回的一行 (列名 -> 值)
pub type Row = Map<String, Value>;

/// 查询结果: 行 + 可选的匹配总数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub count: Option<u64>,
}

impl QueryOutput {
    /// 取出总数, 数据源没有返回总数时视为错误
    pub fn total(&self) -> Result<u64, StoreError> {
        self.count
            .ok_or_else(|| StoreError::Shape("store did not return a row count".to_string()))
    }
}

/// 统一的行存储接口, SQL 与 REST 数据源各自实现
#[async_trait]
pub trait RowStore: Send + Sync {
    /// 数据源名称, 仅用于日志
    fn name(&self) -> &'static str;

    async fn query(&self, spec: &QuerySpec) -> Result<QueryOutput, StoreError>;
}

/// 把行反序列化成目标类型
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(StoreError::from))
        .collect()
}
