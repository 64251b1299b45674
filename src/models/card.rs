use serde::{Deserialize, Serialize};

/// 看板顶部卡片数据 (派生, 不落库)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub number_of_customers: u64,
    pub number_of_invoices: u64,
    pub total_paid_invoices: String,
    pub total_pending_invoices: String,
}

/// 按状态汇总的发票金额 (单位: 分)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTotals {
    pub paid: i64,
    pub pending: i64,
}
