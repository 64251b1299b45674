//! 与具体数据源无关的查询描述
//!
//! 每个查询都先构造一个 [`QuerySpec`], 再交给某个 [`crate::db::RowStore`] 执行。
//! SQL 源把它渲染成带 `$n` 占位符的语句, REST 源渲染成 PostgREST 请求参数,
//! 内存源直接在种子数据上求值。

/// 业务表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Invoices,
    Customers,
    Revenue,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Invoices => "invoices",
            Table::Customers => "customers",
            Table::Revenue => "revenue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// 两表之间的连接条件: `base.local = other.foreign`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: Table,
    pub local: &'static str,
    pub foreign: &'static str,
}

/// 已知的表关系
///
/// 发票 -> 客户 是对一关系 (内连接);
/// 客户 -> 发票 是对多关系 (左连接, 没有发票的客户也要保留)。
pub fn join_for(base: Table, other: Table) -> Option<Join> {
    match (base, other) {
        (Table::Invoices, Table::Customers) => Some(Join {
            kind: JoinKind::Inner,
            table: other,
            local: "customer_id",
            foreign: "id",
        }),
        (Table::Customers, Table::Invoices) => Some(Join {
            kind: JoinKind::Left,
            table: other,
            local: "id",
            foreign: "customer_id",
        }),
        _ => None,
    }
}

/// 限定表名的列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub table: Table,
    pub column: &'static str,
}

impl Field {
    pub const fn new(table: Table, column: &'static str) -> Self {
        Self { table, column }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table.name(), self.column)
    }
}

/// 结果列
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// 普通列, 结果键为列名 (关联表的列也平铺到结果中)
    Field(Field),
    /// 嵌套的对一关联, 结果键为关联表名
    Related {
        table: Table,
        columns: Vec<&'static str>,
    },
    /// `COUNT(field)`, 只统计非空值
    Count { alias: &'static str, field: Field },
    /// `COALESCE(SUM(field), 0)`, 可选地只累加 `when` 条件成立的行
    Sum {
        alias: &'static str,
        field: Field,
        when: Option<(Field, String)>,
    },
}

impl Column {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Column::Count { .. } | Column::Sum { .. })
    }

    pub fn key(&self) -> &'static str {
        match self {
            Column::Field(f) => f.column,
            Column::Related { table, .. } => table.name(),
            Column::Count { alias, .. } | Column::Sum { alias, .. } => *alias,
        }
    }
}

/// 过滤条件 (多个条件之间为 AND)
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// 字段转文本后与值相等
    Eq(Field, String),
    /// 任一字段转文本后不区分大小写地包含 `term`
    Search { term: String, fields: Vec<Field> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: Field,
    pub descending: bool,
}

/// 一次只读查询的完整描述
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub table: Table,
    pub columns: Vec<Column>,
    pub filters: Vec<Filter>,
    pub group_by: Vec<Field>,
    pub order: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// 同时返回匹配总数 (不受 limit/offset 影响)
    pub count: bool,
    /// 只要总数, 不返回行
    pub head: bool,
}

impl QuerySpec {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            count: false,
            head: false,
        }
    }

    /// 选择基表的若干列
    pub fn select(mut self, columns: &[&'static str]) -> Self {
        let table = self.table;
        self.columns
            .extend(columns.iter().map(|c| Column::Field(Field::new(table, *c))));
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn related(self, table: Table, columns: &[&'static str]) -> Self {
        self.column(Column::Related {
            table,
            columns: columns.to_vec(),
        })
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn group_by(mut self, fields: &[Field]) -> Self {
        self.group_by.extend_from_slice(fields);
        self
    }

    pub fn order_by(mut self, field: Field, descending: bool) -> Self {
        self.order.push(Order { field, descending });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// 只统计数量
    pub fn head(mut self) -> Self {
        self.count = true;
        self.head = true;
        self
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || self.columns.iter().any(Column::is_aggregate)
    }

    /// 查询中引用到的非基表 (按首次出现顺序)
    pub fn joined_tables(&self) -> Vec<Table> {
        let mut tables: Vec<Table> = Vec::new();
        let mut push = |t: Table| {
            if t != self.table && !tables.contains(&t) {
                tables.push(t);
            }
        };

        for column in &self.columns {
            match column {
                Column::Field(f) => push(f.table),
                Column::Related { table, .. } => push(*table),
                Column::Count { field, .. } => push(field.table),
                Column::Sum { field, when, .. } => {
                    push(field.table);
                    if let Some((w, _)) = when {
                        push(w.table);
                    }
                }
            }
        }
        for filter in &self.filters {
            match filter {
                Filter::Eq(f, _) => push(f.table),
                Filter::Search { fields, .. } => fields.iter().for_each(|f| push(f.table)),
            }
        }
        self.group_by.iter().for_each(|f| push(f.table));
        self.order.iter().for_each(|o| push(o.field.table));
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_tables_collects_every_reference_once() {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id", "amount"])
            .related(Table::Customers, &["name"])
            .filter(Filter::Search {
                term: "x".into(),
                fields: vec![Field::new(Table::Customers, "email")],
            })
            .order_by(Field::new(Table::Invoices, "date"), true);

        assert_eq!(spec.joined_tables(), vec![Table::Customers]);
        assert!(!spec.is_grouped());
    }

    #[test]
    fn head_implies_count() {
        let spec = QuerySpec::from(Table::Customers).head();
        assert!(spec.count && spec.head);
    }

    #[test]
    fn relations_are_directional() {
        assert_eq!(
            join_for(Table::Invoices, Table::Customers).map(|j| j.kind),
            Some(JoinKind::Inner)
        );
        assert_eq!(
            join_for(Table::Customers, Table::Invoices).map(|j| j.kind),
            Some(JoinKind::Left)
        );
        assert!(join_for(Table::Revenue, Table::Invoices).is_none());
    }
}
