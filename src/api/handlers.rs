use crate::display::{format_date_to_local, generate_pagination, generate_y_axis, PageToken, YAxis};
use crate::error::DataFetchError;
use crate::models::{InvoicesTableRow, Revenue};
use crate::service::{Dashboard, LATEST_INVOICES_LIMIT};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 搜索 + 分页参数
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct LatestParams {
    pub limit: Option<u64>,
}

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// 发票列表行 + 展示字段
#[derive(Debug, Serialize)]
pub struct InvoiceRowView {
    #[serde(flatten)]
    pub row: InvoicesTableRow,
    pub amount_display: String,
    pub date_display: String,
}

#[derive(Debug, Serialize)]
pub struct InvoicePagesResponse {
    pub total_pages: u32,
    pub pagination: Vec<PageToken>,
}

#[derive(Debug, Serialize)]
pub struct RevenueChartResponse {
    pub revenue: Vec<Revenue>,
    pub y_axis: YAxis,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

fn respond<T: Serialize>(result: Result<T, DataFetchError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.message()),
    }
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 月度营收
pub async fn revenue(State(dashboard): State<Arc<Dashboard>>) -> Response {
    respond(dashboard.revenue().await)
}

/// 营收图表 (营收 + 纵轴刻度)
pub async fn revenue_chart(State(dashboard): State<Arc<Dashboard>>) -> Response {
    respond(dashboard.revenue().await.map(|revenue| RevenueChartResponse {
        y_axis: generate_y_axis(&revenue),
        revenue,
    }))
}

/// 最新发票
pub async fn latest_invoices(
    State(dashboard): State<Arc<Dashboard>>,
    Query(params): Query<LatestParams>,
) -> Response {
    let limit = params.limit.unwrap_or(LATEST_INVOICES_LIMIT);
    respond(dashboard.latest_invoices(limit).await)
}

/// 看板卡片 (部分失败时对应指标为 0, 不返回错误)
pub async fn cards(State(dashboard): State<Arc<Dashboard>>) -> Response {
    (StatusCode::OK, Json(dashboard.card_summary().await)).into_response()
}

/// 发票搜索 + 分页
pub async fn filtered_invoices(
    State(dashboard): State<Arc<Dashboard>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let formatter = dashboard.formatter();
    respond(
        dashboard
            .filtered_invoices(&params.query, params.page)
            .await
            .map(|rows| {
                rows.into_iter()
                    .map(|row| InvoiceRowView {
                        amount_display: formatter.format(row.amount),
                        date_display: format_date_to_local(row.date),
                        row,
                    })
                    .collect::<Vec<_>>()
            }),
    )
}

/// 搜索结果总页数 + 分页条
pub async fn invoice_pages(
    State(dashboard): State<Arc<Dashboard>>,
    Query(params): Query<SearchParams>,
) -> Response {
    respond(
        dashboard
            .invoice_pages(&params.query)
            .await
            .map(|total_pages| InvoicePagesResponse {
                pagination: generate_pagination(params.page, total_pages),
                total_pages,
            }),
    )
}

/// 单张发票
pub async fn invoice_by_id(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<String>,
) -> Response {
    match dashboard.invoice_by_id(&id).await {
        Ok(Some(invoice)) => (StatusCode::OK, Json(invoice)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Invoice not found."),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.message()),
    }
}

/// 客户下拉列表
pub async fn customers(State(dashboard): State<Arc<Dashboard>>) -> Response {
    respond(dashboard.customers().await)
}

/// 客户搜索 (含发票汇总)
pub async fn filtered_customers(
    State(dashboard): State<Arc<Dashboard>>,
    Query(params): Query<SearchParams>,
) -> Response {
    respond(dashboard.filtered_customers(&params.query).await)
}
