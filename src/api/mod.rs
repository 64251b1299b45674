pub mod handlers;

pub use handlers::*;

use crate::service::Dashboard;
use axum::{routing::get, Router};
use std::sync::Arc;

/// 构建路由
pub fn router(dashboard: Arc<Dashboard>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/revenue", get(handlers::revenue))
        .route("/api/revenue/chart", get(handlers::revenue_chart))
        .route("/api/cards", get(handlers::cards))
        .route("/api/invoices", get(handlers::filtered_invoices))
        .route("/api/invoices/latest", get(handlers::latest_invoices))
        .route("/api/invoices/pages", get(handlers::invoice_pages))
        .route("/api/invoices/:id", get(handlers::invoice_by_id))
        .route("/api/customers", get(handlers::customers))
        .route("/api/customers/filtered", get(handlers::filtered_customers))
        .with_state(dashboard)
}
