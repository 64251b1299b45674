use crate::db::query::{join_for, Column, Field, Filter, JoinKind, QuerySpec};
use crate::db::store::{QueryOutput, RowStore};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _};

/// PostgreSQL 数据源
///
/// 每行通过 `jsonb_build_object` 直接返回 JSON, 因此所有查询共用同一套行解码。
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn query(&self, spec: &QuerySpec) -> Result<QueryOutput, StoreError> {
        let count = if spec.count {
            let mut builder = render_count(spec)?;
            let total: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
            Some(total.max(0) as u64)
        } else {
            None
        };

        if spec.head {
            return Ok(QueryOutput {
                rows: Vec::new(),
                count,
            });
        }

        let mut builder = render_select(spec)?;
        tracing::debug!(sql = builder.sql(), "执行查询");
        let records = builder.build().fetch_all(&self.pool).await?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            match record.try_get::<Value, _>("row")? {
                Value::Object(row) => rows.push(row),
                other => {
                    return Err(StoreError::Shape(format!(
                        "expected a json object per row, got {other}"
                    )))
                }
            }
        }

        Ok(QueryOutput { rows, count })
    }
}

/// 渲染查询语句: `SELECT jsonb_build_object(...) AS row FROM ... LIMIT $n OFFSET $m`
pub fn render_select(spec: &QuerySpec) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut builder = QueryBuilder::new("SELECT jsonb_build_object(");
    for (idx, column) in spec.columns.iter().enumerate() {
        if idx > 0 {
            builder.push(", ");
        }
        push_column(&mut builder, column);
    }
    builder.push(") AS row");

    push_from(&mut builder, spec)?;
    push_where(&mut builder, spec);
    push_group_by(&mut builder, spec);

    if !spec.order.is_empty() {
        builder.push(" ORDER BY ");
        for (idx, order) in spec.order.iter().enumerate() {
            if idx > 0 {
                builder.push(", ");
            }
            builder.push(order.field.qualified());
            builder.push(if order.descending { " DESC" } else { " ASC" });
        }
    }

    if let Some(limit) = spec.limit {
        builder.push(" LIMIT ");
        builder.push_bind(window_bound(limit));
    }
    if let Some(offset) = spec.offset {
        builder.push(" OFFSET ");
        builder.push_bind(window_bound(offset));
    }

    Ok(builder)
}

/// LIMIT/OFFSET 绑定为 BIGINT, 超出范围时取 i64::MAX (等同于不限制)
fn window_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// 渲染计数语句, 分组查询统计分组数
pub fn render_count(spec: &QuerySpec) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT 1");
    push_from(&mut builder, spec)?;
    push_where(&mut builder, spec);
    push_group_by(&mut builder, spec);
    builder.push(") AS matched");
    Ok(builder)
}

fn push_column(builder: &mut QueryBuilder<'static, Postgres>, column: &Column) {
    builder.push(format!("'{}', ", column.key()));
    match column {
        Column::Field(field) => {
            builder.push(field.qualified());
        }
        Column::Related { table, columns } => {
            builder.push("jsonb_build_object(");
            let pairs: Vec<String> = columns
                .iter()
                .map(|c| format!("'{c}', {}.{c}", table.name()))
                .collect();
            builder.push(pairs.join(", "));
            builder.push(")");
        }
        Column::Count { field, .. } => {
            builder.push(format!("COUNT({})", field.qualified()));
        }
        Column::Sum { field, when, .. } => match when {
            Some((cond, value)) => {
                builder.push(format!(
                    "COALESCE(SUM(CASE WHEN {}::text = ",
                    cond.qualified()
                ));
                builder.push_bind(value.clone());
                builder.push(format!(" THEN {} ELSE 0 END), 0)", field.qualified()));
            }
            None => {
                builder.push(format!("COALESCE(SUM({}), 0)", field.qualified()));
            }
        },
    }
}

fn push_from(builder: &mut QueryBuilder<'static, Postgres>, spec: &QuerySpec) -> Result<(), StoreError> {
    builder.push(format!(" FROM {}", spec.table.name()));
    for table in spec.joined_tables() {
        let join = join_for(spec.table, table).ok_or_else(|| {
            StoreError::Unsupported(format!(
                "no relation from {} to {}",
                spec.table.name(),
                table.name()
            ))
        })?;
        let keyword = match join.kind {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
        };
        builder.push(format!(
            "{keyword}{other} ON {base}.{local} = {other}.{foreign}",
            other = table.name(),
            base = spec.table.name(),
            local = join.local,
            foreign = join.foreign,
        ));
    }
    Ok(())
}

fn push_where(builder: &mut QueryBuilder<'static, Postgres>, spec: &QuerySpec) {
    for (idx, filter) in spec.filters.iter().enumerate() {
        builder.push(if idx == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Eq(field, value) => {
                builder.push(format!("{}::text = ", field.qualified()));
                builder.push_bind(value.clone());
            }
            Filter::Search { term, fields } => {
                let pattern = like_pattern(term);
                builder.push("(");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    push_ilike(builder, field, &pattern);
                }
                builder.push(")");
            }
        }
    }
}

fn push_ilike(builder: &mut QueryBuilder<'static, Postgres>, field: &Field, pattern: &str) {
    builder.push(format!("{}::text ILIKE ", field.qualified()));
    builder.push_bind(pattern.to_string());
}

fn push_group_by(builder: &mut QueryBuilder<'static, Postgres>, spec: &QuerySpec) {
    if spec.group_by.is_empty() {
        return;
    }
    let fields: Vec<String> = spec.group_by.iter().map(Field::qualified).collect();
    builder.push(" GROUP BY ");
    builder.push(fields.join(", "));
}

/// 搜索词按字面匹配: 转义 LIKE 通配符后两侧加 `%`
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::Table;

    const INVOICE_DATE: Field = Field::new(Table::Invoices, "date");

    #[test]
    fn select_renders_join_filters_and_window() {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id", "amount"])
            .column(Column::Field(Field::new(Table::Customers, "name")))
            .filter(Filter::Search {
                term: "lee".into(),
                fields: vec![
                    Field::new(Table::Customers, "name"),
                    Field::new(Table::Invoices, "status"),
                ],
            })
            .order_by(INVOICE_DATE, true)
            .limit(6)
            .offset(12);

        let builder = render_select(&spec).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT jsonb_build_object('id', invoices.id, 'amount', invoices.amount, \
             'name', customers.name) AS row FROM invoices \
             JOIN customers ON invoices.customer_id = customers.id \
             WHERE (customers.name::text ILIKE $1 OR invoices.status::text ILIKE $2) \
             ORDER BY invoices.date DESC LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn grouped_sums_use_left_join_and_bound_condition() {
        let spec = QuerySpec::from(Table::Customers)
            .select(&["id"])
            .column(Column::Sum {
                alias: "total_paid",
                field: Field::new(Table::Invoices, "amount"),
                when: Some((Field::new(Table::Invoices, "status"), "paid".into())),
            })
            .group_by(&[Field::new(Table::Customers, "id")]);

        let builder = render_select(&spec).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT jsonb_build_object('id', customers.id, 'total_paid', \
             COALESCE(SUM(CASE WHEN invoices.status::text = $1 THEN invoices.amount ELSE 0 END), 0)) \
             AS row FROM customers LEFT JOIN invoices ON customers.id = invoices.customer_id \
             GROUP BY customers.id"
        );
    }

    #[test]
    fn count_ignores_order_and_window() {
        let spec = QuerySpec::from(Table::Invoices)
            .filter(Filter::Eq(Field::new(Table::Invoices, "status"), "paid".into()))
            .order_by(INVOICE_DATE, true)
            .limit(6)
            .head();

        let builder = render_count(&spec).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM (SELECT 1 FROM invoices WHERE invoices.status::text = $1) AS matched"
        );
    }

    #[test]
    fn related_column_renders_nested_object() {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id"])
            .related(Table::Customers, &["name", "email"]);
        let builder = render_select(&spec).unwrap();
        assert!(builder.sql().contains(
            "'customers', jsonb_build_object('name', customers.name, 'email', customers.email)"
        ));
    }

    #[test]
    fn unknown_relation_is_unsupported() {
        let spec = QuerySpec::from(Table::Revenue).column(Column::Field(INVOICE_DATE));
        assert!(matches!(render_select(&spec), Err(StoreError::Unsupported(_))));
    }

    #[test]
    fn window_bounds_saturate_instead_of_wrapping() {
        assert_eq!(window_bound(6), 6);
        assert_eq!(window_bound(i64::MAX as u64), i64::MAX);
        assert_eq!(window_bound(u64::MAX), i64::MAX);

        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id"])
            .limit(u64::MAX)
            .offset(u64::MAX);
        let builder = render_select(&spec).unwrap();
        assert!(builder.sql().ends_with("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
