use crate::config::RestConfig;
use crate::db::query::{Column, Field, Filter, QuerySpec};
use crate::db::store::{QueryOutput, Row, RowStore};
use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;

/// PostgREST 风格的 REST 数据源
///
/// 只支持基表上的过滤与排序、嵌套的对一关联以及精确计数;
/// 分组聚合和跨表过滤请走 SQL 数据源。
#[derive(Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestStore {
    pub fn new(config: &RestConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl RowStore for RestStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn query(&self, spec: &QuerySpec) -> Result<QueryOutput, StoreError> {
        let params = render_params(spec)?;
        let url = format!("{}/{}", self.base_url, spec.table.name());

        let mut request = if spec.head {
            self.client.head(&url)
        } else {
            self.client.get(&url)
        };
        request = request.query(&params);
        if spec.count {
            request = request.header("Prefer", "count=exact");
        }
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let count = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .filter(|_| spec.count);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if spec.head {
            return Ok(QueryOutput {
                rows: Vec::new(),
                count,
            });
        }

        let rows: Vec<Row> = response.json().await?;
        tracing::debug!(table = spec.table.name(), rows = rows.len(), "REST 查询完成");
        Ok(QueryOutput { rows, count })
    }
}

/// 把查询描述渲染为 PostgREST 查询参数
pub fn render_params(spec: &QuerySpec) -> Result<Vec<(String, String)>, StoreError> {
    if spec.is_grouped() {
        return Err(StoreError::Unsupported(
            "grouped aggregation over the rest store".to_string(),
        ));
    }

    let base = |field: &Field| -> Result<&'static str, StoreError> {
        if field.table == spec.table {
            Ok(field.column)
        } else {
            Err(StoreError::Unsupported(format!(
                "field {} outside base table {}",
                field.qualified(),
                spec.table.name()
            )))
        }
    };

    let mut select = Vec::with_capacity(spec.columns.len());
    for column in &spec.columns {
        match column {
            Column::Field(field) => select.push(base(field)?.to_string()),
            Column::Related { table, columns } => {
                select.push(format!("{}({})", table.name(), columns.join(",")))
            }
            Column::Count { alias, .. } | Column::Sum { alias, .. } => {
                return Err(StoreError::Unsupported(format!("aggregate column {alias}")))
            }
        }
    }
    let select = if select.is_empty() {
        "*".to_string()
    } else {
        select.join(",")
    };

    let mut params = vec![("select".to_string(), select)];

    for filter in &spec.filters {
        match filter {
            Filter::Eq(field, value) => {
                params.push((base(field)?.to_string(), format!("eq.{value}")));
            }
            Filter::Search { term, fields } => {
                let pattern = quote(&ilike_pattern(term)?);
                let mut alternatives = Vec::with_capacity(fields.len());
                for field in fields {
                    alternatives.push(format!("{}.ilike.{}", base(field)?, pattern));
                }
                params.push(("or".to_string(), format!("({})", alternatives.join(","))));
            }
        }
    }

    if !spec.order.is_empty() {
        let mut order = Vec::with_capacity(spec.order.len());
        for o in &spec.order {
            let direction = if o.descending { "desc" } else { "asc" };
            order.push(format!("{}.{direction}", base(&o.field)?));
        }
        params.push(("order".to_string(), order.join(",")));
    }

    if let Some(limit) = spec.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = spec.offset {
        params.push(("offset".to_string(), offset.to_string()));
    }

    Ok(params)
}

/// 搜索词按字面匹配: 转义 LIKE 通配符后两侧加 `*`
///
/// PostgREST 会把 `*` 整体替换为 `%`, 无法转义, 含 `*` 的搜索词直接拒绝。
pub fn ilike_pattern(term: &str) -> Result<String, StoreError> {
    if term.contains('*') {
        return Err(StoreError::Unsupported(format!(
            "search term {term:?} contains '*'"
        )));
    }
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('*');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    Ok(pattern)
}

/// PostgREST 保留字符 (逗号、括号) 需要用双引号包裹
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// 解析 `Content-Range: 0-4/13` 或 `*/13` 中的总数
pub fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
