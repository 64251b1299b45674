use crate::db::query::{join_for, Column, Field, Filter, JoinKind, Order, QuerySpec, Table};
use crate::db::store::{decode_rows, QueryOutput, Row, RowStore};
use crate::error::StoreError;
use crate::models::{Customer, Invoice, Revenue};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// 对一关联在结果中的表示形式
///
/// 不同数据源对同一个对一关联的表示不同: 有的返回对象, 有的返回单元素数组。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationStyle {
    #[default]
    Object,
    Singleton,
}

/// 内存数据源, 语义与 SQL 数据源一致 (ILIKE 子串匹配, NULL 排序规则, 左/内连接)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<Table, Vec<Row>>,
    relation_style: RelationStyle,
    failing: Vec<Table>,
}

/// 一条连接后的记录: 表 -> 该表的行 (左连接未命中时为 None)
type Joined<'a> = Vec<(Table, Option<&'a Row>)>;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置的演示数据
    pub fn placeholder() -> Result<Self, StoreError> {
        let data: HashMap<String, Vec<Row>> =
            serde_json::from_str(include_str!("../../data/placeholder.json"))?;
        let mut store = Self::new();
        for (name, rows) in data {
            // 先按实体类型校验一遍, 演示数据有误时尽早失败
            let table = match name.as_str() {
                "invoices" => {
                    decode_rows::<Invoice>(rows.clone())?;
                    Table::Invoices
                }
                "customers" => {
                    decode_rows::<Customer>(rows.clone())?;
                    Table::Customers
                }
                "revenue" => {
                    decode_rows::<Revenue>(rows.clone())?;
                    Table::Revenue
                }
                other => return Err(StoreError::Shape(format!("unknown table {other}"))),
            };
            store = store.with_rows(table, rows);
        }
        Ok(store)
    }

    pub fn with_rows(mut self, table: Table, rows: Vec<Row>) -> Self {
        self.tables.entry(table).or_default().extend(rows);
        self
    }

    pub fn with_relation_style(mut self, style: RelationStyle) -> Self {
        self.relation_style = style;
        self
    }

    /// 让针对某张表的查询全部失败 (模拟数据源故障)
    pub fn failing_on(mut self, table: Table) -> Self {
        self.failing.push(table);
        self
    }

    fn rows(&self, table: Table) -> &[Row] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn join<'a>(&'a self, spec: &QuerySpec) -> Result<Vec<Joined<'a>>, StoreError> {
        let mut records: Vec<Joined<'a>> = self
            .rows(spec.table)
            .iter()
            .map(|row| vec![(spec.table, Some(row))])
            .collect();

        for table in spec.joined_tables() {
            let join = join_for(spec.table, table).ok_or_else(|| {
                StoreError::Unsupported(format!(
                    "no relation from {} to {}",
                    spec.table.name(),
                    table.name()
                ))
            })?;

            let mut next = Vec::with_capacity(records.len());
            for record in records {
                let key = lookup(&record, Field::new(spec.table, join.local)).and_then(text);
                let matches: Vec<&Row> = self
                    .rows(table)
                    .iter()
                    .filter(|other| {
                        key.is_some() && other.get(join.foreign).and_then(text) == key
                    })
                    .collect();

                if matches.is_empty() {
                    if join.kind == JoinKind::Left {
                        let mut record = record;
                        record.push((table, None));
                        next.push(record);
                    }
                    continue;
                }
                for other in matches {
                    let mut record = record.clone();
                    record.push((table, Some(other)));
                    next.push(record);
                }
            }
            records = next;
        }

        Ok(records)
    }

    fn project(&self, spec: &QuerySpec, record: &Joined<'_>) -> Row {
        let mut row = Map::new();
        for column in &spec.columns {
            let value = match column {
                Column::Field(field) => lookup(record, *field).cloned().unwrap_or(Value::Null),
                Column::Related { table, columns } => {
                    let related = record
                        .iter()
                        .find(|(t, _)| t == table)
                        .and_then(|(_, row)| *row);
                    match related {
                        Some(related) => {
                            let object: Map<String, Value> = columns
                                .iter()
                                .map(|c| {
                                    let v = related.get(*c).cloned().unwrap_or(Value::Null);
                                    (c.to_string(), v)
                                })
                                .collect();
                            match self.relation_style {
                                RelationStyle::Object => Value::Object(object),
                                RelationStyle::Singleton => {
                                    Value::Array(vec![Value::Object(object)])
                                }
                            }
                        }
                        None => Value::Null,
                    }
                }
                // 聚合列只在分组路径中计算
                Column::Count { .. } | Column::Sum { .. } => Value::Null,
            };
            row.insert(column.key().to_string(), value);
        }
        row
    }

    fn aggregate(&self, spec: &QuerySpec, group: &[Joined<'_>]) -> Row {
        let mut row = match group.first() {
            Some(first) => self.project(spec, first),
            None => Map::new(),
        };
        for column in &spec.columns {
            match column {
                Column::Count { alias, field } => {
                    let n = group
                        .iter()
                        .filter(|r| lookup(r, *field).map_or(false, |v| !v.is_null()))
                        .count();
                    row.insert(alias.to_string(), Value::from(n as i64));
                }
                Column::Sum { alias, field, when } => {
                    let total: i64 = group
                        .iter()
                        .filter(|r| match when {
                            Some((cond, expected)) => {
                                lookup(r, *cond).and_then(text).as_deref()
                                    == Some(expected.as_str())
                            }
                            None => true,
                        })
                        .filter_map(|r| lookup(r, *field).and_then(Value::as_i64))
                        .sum();
                    row.insert(alias.to_string(), Value::from(total));
                }
                Column::Field(_) | Column::Related { .. } => {}
            }
        }
        row
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn query(&self, spec: &QuerySpec) -> Result<QueryOutput, StoreError> {
        if self.failing.contains(&spec.table) {
            return Err(StoreError::Status {
                status: 503,
                body: format!("table {} is unavailable", spec.table.name()),
            });
        }

        let mut records = self.join(spec)?;
        records.retain(|record| spec.filters.iter().all(|f| matches_filter(record, f)));

        let mut rows: Vec<Row> = if spec.is_grouped() {
            let mut groups: IndexMap<Vec<Option<String>>, Vec<Joined<'_>>> = IndexMap::new();
            for record in records {
                let key = spec
                    .group_by
                    .iter()
                    .map(|f| lookup(&record, *f).and_then(text))
                    .collect();
                groups.entry(key).or_default().push(record);
            }
            let mut groups: Vec<Vec<Joined<'_>>> = groups.into_values().collect();
            groups.sort_by(|a, b| match (a.first(), b.first()) {
                (Some(a), Some(b)) => compare_records(a, b, &spec.order),
                _ => Ordering::Equal,
            });
            groups.iter().map(|g| self.aggregate(spec, g)).collect()
        } else {
            records.sort_by(|a, b| compare_records(a, b, &spec.order));
            records.iter().map(|r| self.project(spec, r)).collect()
        };

        let count = spec.count.then_some(rows.len() as u64);
        if spec.head {
            return Ok(QueryOutput {
                rows: Vec::new(),
                count,
            });
        }

        let offset = spec.offset.unwrap_or(0) as usize;
        rows = rows.into_iter().skip(offset).collect();
        if let Some(limit) = spec.limit {
            rows.truncate(limit as usize);
        }

        Ok(QueryOutput { rows, count })
    }
}

fn lookup<'a>(record: &Joined<'a>, field: Field) -> Option<&'a Value> {
    record
        .iter()
        .find(|(t, _)| *t == field.table)
        .and_then(|(_, row)| *row)
        .and_then(|row| row.get(field.column))
}

/// 等价于 SQL 中的 `value::text`
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches_filter(record: &Joined<'_>, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(field, expected) => {
            lookup(record, *field).and_then(text).as_deref() == Some(expected.as_str())
        }
        Filter::Search { term, fields } => {
            let needle = term.to_lowercase();
            fields.iter().any(|field| {
                lookup(record, *field)
                    .and_then(text)
                    .map_or(false, |hay| hay.to_lowercase().contains(&needle))
            })
        }
    }
}

fn compare_records(a: &Joined<'_>, b: &Joined<'_>, order: &[Order]) -> Ordering {
    for o in order {
        let ord = compare_values(lookup(a, o.field), lookup(b, o.field), o.descending);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// PostgreSQL 规则: 升序时 NULL 排在最后, 降序时排在最前
fn compare_values(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ord = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(x), Some(y)) => text(x).cmp(&text(y)),
    };
    if descending {
        ord.reverse()
    } else {
        ord
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture rows must be objects"),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_rows(
                Table::Customers,
                vec![
                    row(json!({"id": "c1", "name": "Lee", "email": "lee@x.com"})),
                    row(json!({"id": "c2", "name": "Amy", "email": "amy@x.com"})),
                ],
            )
            .with_rows(
                Table::Invoices,
                vec![
                    row(json!({"id": "i1", "customer_id": "c1", "amount": 100, "status": "paid", "date": "2023-01-02"})),
                    row(json!({"id": "i2", "customer_id": "c1", "amount": 250, "status": "pending", "date": "2023-03-01"})),
                    row(json!({"id": "i3", "customer_id": "c9", "amount": 999, "status": "paid", "date": "2023-02-01"})),
                ],
            )
    }

    #[tokio::test]
    async fn inner_join_drops_orphans() {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id"])
            .related(Table::Customers, &["name"])
            .order_by(Field::new(Table::Invoices, "date"), true);

        let out = store().query(&spec).await.unwrap();
        let ids: Vec<_> = out.rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("i2"), json!("i1")]);
        assert_eq!(out.rows[0]["customers"], json!({"name": "Lee"}));
    }

    #[tokio::test]
    async fn singleton_style_wraps_relation_in_array() {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id"])
            .related(Table::Customers, &["name"])
            .limit(1);

        let out = store()
            .with_relation_style(RelationStyle::Singleton)
            .query(&spec)
            .await
            .unwrap();
        assert_eq!(out.rows[0]["customers"], json!([{"name": "Lee"}]));
    }

    #[tokio::test]
    async fn left_join_groups_keep_customers_without_invoices() {
        let amount = Field::new(Table::Invoices, "amount");
        let status = Field::new(Table::Invoices, "status");
        let spec = QuerySpec::from(Table::Customers)
            .select(&["id", "name"])
            .column(Column::Count {
                alias: "total_invoices",
                field: Field::new(Table::Invoices, "id"),
            })
            .column(Column::Sum {
                alias: "total_paid",
                field: amount,
                when: Some((status, "paid".into())),
            })
            .group_by(&[Field::new(Table::Customers, "id")])
            .order_by(Field::new(Table::Customers, "name"), false);

        let out = store().query(&spec).await.unwrap();
        assert_eq!(
            out.rows,
            vec![
                row(json!({"id": "c2", "name": "Amy", "total_invoices": 0, "total_paid": 0})),
                row(json!({"id": "c1", "name": "Lee", "total_invoices": 2, "total_paid": 100})),
            ]
        );
    }

    #[tokio::test]
    async fn search_casts_numbers_to_text() {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id"])
            .filter(Filter::Search {
                term: "25".into(),
                fields: vec![Field::new(Table::Invoices, "amount")],
            });

        let out = store().query(&spec).await.unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0]["id"], json!("i2"));

        let out = store().query(&spec.head()).await.unwrap();
        assert_eq!(out.count, Some(1));
    }

    #[tokio::test]
    async fn head_returns_count_without_rows() {
        let out = store()
            .query(&QuerySpec::from(Table::Invoices).head())
            .await
            .unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(out.count, Some(3));
    }

    #[tokio::test]
    async fn failing_table_reports_store_error() {
        let err = store()
            .failing_on(Table::Customers)
            .query(&QuerySpec::from(Table::Customers).head())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 503, .. }));
    }

    #[test]
    fn placeholder_data_loads() {
        let store = MemoryStore::placeholder().unwrap();
        assert!(!store.rows(Table::Invoices).is_empty());
        assert!(!store.rows(Table::Customers).is_empty());
        assert!(!store.rows(Table::Revenue).is_empty());
    }
}
