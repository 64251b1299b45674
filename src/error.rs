use thiserror::Error;

/// 数据源层错误 (只记录日志, 不向调用方透出)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rest store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// 该数据源无法表达的查询 (例如 REST 源上的分组聚合)
    #[error("unsupported query: {0}")]
    Unsupported(String),

    /// 关联字段形态不符合预期 (既非对象也非单元素数组)
    #[error("unexpected row shape: {0}")]
    Shape(String),
}

/// 对外统一的查询失败
///
/// 只携带每个查询固定的描述信息, 底层的 `StoreError` 在 [`crate::service::fetch`]
/// 中记录后即被丢弃。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DataFetchError {
    message: &'static str,
}

impl DataFetchError {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &'static str {
        self.message
    }
}
