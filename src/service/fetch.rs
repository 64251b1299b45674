use crate::error::{DataFetchError, StoreError};
use std::fmt::Debug;
use std::future::Future;

/// 执行查询并统一处理错误
///
/// 失败时记录底层 `StoreError`, 只向调用方返回带固定描述的 [`DataFetchError`];
/// 成功时在 debug 级别记录取到的数据。所有查询都通过这里出口。
pub async fn fetch<T, F>(query: F, message: &'static str) -> Result<T, DataFetchError>
where
    T: Debug,
    F: Future<Output = Result<T, StoreError>>,
{
    match query.await {
        Ok(data) => {
            tracing::debug!(payload = ?data, "查询成功");
            Ok(data)
        }
        Err(e) => {
            tracing::error!(error = %e, "Database Error: {}", message);
            Err(DataFetchError::new(message))
        }
    }
}

/// 部分失败容忍: 失败时记录日志并退化为默认值
pub async fn fetch_or_default<T, F>(query: F, metric: &'static str) -> T
where
    T: Debug + Default,
    F: Future<Output = Result<T, StoreError>>,
{
    match query.await {
        Ok(data) => {
            tracing::debug!(metric, payload = ?data, "卡片指标查询成功");
            data
        }
        Err(e) => {
            tracing::error!(metric, error = %e, "卡片指标查询失败, 使用默认值");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_hides_store_error_text() {
        let result: Result<u64, _> = fetch(
            async { Err(StoreError::Unsupported("secret table layout".into())) },
            "Failed to fetch invoices.",
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch invoices.");
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn fetch_passes_data_through() {
        let value = fetch(async { Ok::<_, StoreError>(vec![1, 2, 3]) }, "Failed to fetch invoices.")
            .await
            .unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fetch_or_default_degrades() {
        let n: u64 = fetch_or_default(
            async { Err(StoreError::Shape("boom".into())) },
            "number_of_invoices",
        )
        .await;
        assert_eq!(n, 0);
    }
}
