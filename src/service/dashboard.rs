use crate::db::{decode_rows, Column, Field, Filter, QuerySpec, RowStore, Table};
use crate::display::{CurrencyFormatter, UsdFormatter};
use crate::error::{DataFetchError, StoreError};
use crate::models::{
    CardSummary, CustomerField, CustomersTableRaw, FormattedCustomersTable, InvoiceForm,
    InvoiceFormRaw, InvoiceStatus, InvoicesTableRow, LatestInvoice, LatestInvoiceRaw, Revenue,
    StatusTotals,
};
use crate::service::fetch::{fetch, fetch_or_default};
use crate::service::normalize::flatten_relation;
use serde::Deserialize;
use std::sync::Arc;

/// 发票列表每页条数
pub const ITEMS_PER_PAGE: u64 = 6;
/// 最新发票默认条数
pub const LATEST_INVOICES_LIMIT: u64 = 5;

pub const REVENUE_ERROR: &str = "Failed to fetch revenue data.";
pub const LATEST_INVOICES_ERROR: &str = "Failed to fetch the latest invoices.";
pub const FILTERED_INVOICES_ERROR: &str = "Failed to fetch invoices.";
pub const INVOICE_PAGES_ERROR: &str = "Failed to fetch total number of invoices.";
pub const INVOICE_ERROR: &str = "Failed to fetch invoice.";
pub const CUSTOMERS_ERROR: &str = "Failed to fetch all customers.";
pub const CUSTOMER_TABLE_ERROR: &str = "Failed to fetch customer table.";

const INVOICE_ID: Field = Field::new(Table::Invoices, "id");
const INVOICE_AMOUNT: Field = Field::new(Table::Invoices, "amount");
const INVOICE_DATE: Field = Field::new(Table::Invoices, "date");
const INVOICE_STATUS: Field = Field::new(Table::Invoices, "status");
const CUSTOMER_ID: Field = Field::new(Table::Customers, "id");
const CUSTOMER_NAME: Field = Field::new(Table::Customers, "name");
const CUSTOMER_EMAIL: Field = Field::new(Table::Customers, "email");
const CUSTOMER_IMAGE: Field = Field::new(Table::Customers, "image_url");

/// 发票搜索条件
///
/// 列表查询与页数统计共用这一个条件, 两者对"匹配"的判定必须一致。
pub fn invoice_search(term: &str) -> Filter {
    Filter::Search {
        term: term.to_string(),
        fields: vec![
            CUSTOMER_NAME,
            CUSTOMER_EMAIL,
            INVOICE_AMOUNT,
            INVOICE_DATE,
            INVOICE_STATUS,
        ],
    }
}

/// 客户搜索条件: 名称或邮箱
pub fn customer_search(term: &str) -> Filter {
    Filter::Search {
        term: term.to_string(),
        fields: vec![CUSTOMER_NAME, CUSTOMER_EMAIL],
    }
}

/// ceil(matches / ITEMS_PER_PAGE)
pub fn page_count(matches: u64) -> u32 {
    let pages = matches.div_ceil(ITEMS_PER_PAGE);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Deserialize)]
struct AmountStatus {
    amount: i64,
    status: InvoiceStatus,
}

/// 看板查询服务
///
/// `sql` 承担搜索、分页与聚合查询; `rest` 承担营收、最新发票与卡片数据。
/// 两者可以是同一个数据源。
#[derive(Clone)]
pub struct Dashboard {
    sql: Arc<dyn RowStore>,
    rest: Arc<dyn RowStore>,
    formatter: Arc<dyn CurrencyFormatter>,
}

impl Dashboard {
    pub fn new(sql: Arc<dyn RowStore>, rest: Arc<dyn RowStore>) -> Self {
        tracing::info!(sql = sql.name(), rest = rest.name(), "Dashboard stores configured");
        Self {
            sql,
            rest,
            formatter: Arc::new(UsdFormatter),
        }
    }

    /// 所有查询走同一个数据源
    pub fn single(store: Arc<dyn RowStore>) -> Self {
        Self::new(store.clone(), store)
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn CurrencyFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn formatter(&self) -> &dyn CurrencyFormatter {
        self.formatter.as_ref()
    }

    /// 月度营收
    pub async fn revenue(&self) -> Result<Vec<Revenue>, DataFetchError> {
        let spec = QuerySpec::from(Table::Revenue).select(&["month", "revenue"]);
        fetch(
            async { decode_rows(self.rest.query(&spec).await?.rows) },
            REVENUE_ERROR,
        )
        .await
    }

    /// 最新的若干张发票, 按日期倒序, 金额已格式化
    pub async fn latest_invoices(&self, limit: u64) -> Result<Vec<LatestInvoice>, DataFetchError> {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["amount", "id"])
            .related(Table::Customers, &["name", "image_url", "email"])
            .order_by(INVOICE_DATE, true)
            .limit(limit);

        let raw: Vec<LatestInvoiceRaw> = fetch(
            async {
                let out = self.rest.query(&spec).await?;
                let rows = out
                    .rows
                    .into_iter()
                    .map(|row| flatten_relation(row, Table::Customers.name()))
                    .collect::<Result<Vec<_>, _>>()?;
                decode_rows(rows)
            },
            LATEST_INVOICES_ERROR,
        )
        .await?;

        Ok(raw
            .into_iter()
            .map(|invoice| LatestInvoice {
                amount: self.formatter.format(invoice.amount),
                id: invoice.id,
                name: invoice.name,
                image_url: invoice.image_url,
                email: invoice.email,
            })
            .collect())
    }

    /// 看板卡片数据
    ///
    /// 三个子查询并发执行、各自容错: 任一失败只会让对应指标退化为 0,
    /// 其余指标照常返回。
    pub async fn card_summary(&self) -> CardSummary {
        let invoices = fetch_or_default(self.count(Table::Invoices), "number_of_invoices");
        let customers = fetch_or_default(self.count(Table::Customers), "number_of_customers");
        let totals = fetch_or_default(self.status_totals(), "invoice_status_totals");

        let (number_of_invoices, number_of_customers, totals) =
            futures::join!(invoices, customers, totals);

        CardSummary {
            number_of_customers,
            number_of_invoices,
            total_paid_invoices: self.formatter.format(totals.paid),
            total_pending_invoices: self.formatter.format(totals.pending),
        }
    }

    async fn count(&self, table: Table) -> Result<u64, StoreError> {
        self.rest.query(&QuerySpec::from(table).head()).await?.total()
    }

    async fn status_totals(&self) -> Result<StatusTotals, StoreError> {
        let spec = QuerySpec::from(Table::Invoices).select(&["amount", "status"]);
        let rows: Vec<AmountStatus> = decode_rows(self.rest.query(&spec).await?.rows)?;

        Ok(rows.iter().fold(StatusTotals::default(), |mut acc, row| {
            match row.status {
                InvoiceStatus::Paid => acc.paid += row.amount,
                InvoiceStatus::Pending => acc.pending += row.amount,
            }
            acc
        }))
    }

    /// 按搜索词过滤的发票列表 (第 `page` 页, 从 1 开始; 小于 1 按第 1 页处理)
    pub async fn filtered_invoices(
        &self,
        query: &str,
        page: u32,
    ) -> Result<Vec<InvoicesTableRow>, DataFetchError> {
        let offset = (u64::from(page.max(1)) - 1) * ITEMS_PER_PAGE;
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id", "amount", "date", "status", "customer_id"])
            .column(Column::Field(CUSTOMER_NAME))
            .column(Column::Field(CUSTOMER_EMAIL))
            .column(Column::Field(CUSTOMER_IMAGE))
            .filter(invoice_search(query))
            .order_by(INVOICE_DATE, true)
            .limit(ITEMS_PER_PAGE)
            .offset(offset);

        fetch(
            async { decode_rows(self.sql.query(&spec).await?.rows) },
            FILTERED_INVOICES_ERROR,
        )
        .await
    }

    /// 搜索结果的总页数
    pub async fn invoice_pages(&self, query: &str) -> Result<u32, DataFetchError> {
        let spec = QuerySpec::from(Table::Invoices)
            .filter(invoice_search(query))
            .head();

        let matches = fetch(
            async { self.sql.query(&spec).await?.total() },
            INVOICE_PAGES_ERROR,
        )
        .await?;
        Ok(page_count(matches))
    }

    /// 按 id 查询发票, 金额由分换算为元; 不存在时返回 `None`
    pub async fn invoice_by_id(&self, id: &str) -> Result<Option<InvoiceForm>, DataFetchError> {
        let spec = QuerySpec::from(Table::Invoices)
            .select(&["id", "customer_id", "amount", "status"])
            .filter(Filter::Eq(INVOICE_ID, id.to_string()))
            .limit(1);

        let rows: Vec<InvoiceFormRaw> = fetch(
            async { decode_rows(self.sql.query(&spec).await?.rows) },
            INVOICE_ERROR,
        )
        .await?;
        Ok(rows.into_iter().next().map(InvoiceForm::from))
    }

    /// 所有客户 (id, 名称), 按名称升序
    pub async fn customers(&self) -> Result<Vec<CustomerField>, DataFetchError> {
        let spec = QuerySpec::from(Table::Customers)
            .select(&["id", "name"])
            .order_by(CUSTOMER_NAME, false);

        fetch(
            async { decode_rows(self.sql.query(&spec).await?.rows) },
            CUSTOMERS_ERROR,
        )
        .await
    }

    /// 按名称或邮箱过滤的客户列表, 附带发票数与待付/已付合计
    pub async fn filtered_customers(
        &self,
        query: &str,
    ) -> Result<Vec<FormattedCustomersTable>, DataFetchError> {
        let spec = QuerySpec::from(Table::Customers)
            .select(&["id", "name", "email", "image_url"])
            .column(Column::Count {
                alias: "total_invoices",
                field: INVOICE_ID,
            })
            .column(Column::Sum {
                alias: "total_pending",
                field: INVOICE_AMOUNT,
                when: Some((INVOICE_STATUS, InvoiceStatus::Pending.as_str().to_string())),
            })
            .column(Column::Sum {
                alias: "total_paid",
                field: INVOICE_AMOUNT,
                when: Some((INVOICE_STATUS, InvoiceStatus::Paid.as_str().to_string())),
            })
            .filter(customer_search(query))
            .group_by(&[CUSTOMER_ID, CUSTOMER_NAME, CUSTOMER_EMAIL, CUSTOMER_IMAGE])
            .order_by(CUSTOMER_NAME, false);

        let raw: Vec<CustomersTableRaw> = fetch(
            async { decode_rows(self.sql.query(&spec).await?.rows) },
            CUSTOMER_TABLE_ERROR,
        )
        .await?;

        Ok(raw
            .into_iter()
            .map(|customer| FormattedCustomersTable {
                total_pending: self.formatter.format(customer.total_pending),
                total_paid: self.formatter.format(customer.total_paid),
                id: customer.id,
                name: customer.name,
                email: customer.email,
                image_url: customer.image_url,
                total_invoices: customer.total_invoices,
            })
            .collect())
    }
}
