use serde::{Deserialize, Serialize};

/// 客户表 (customers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image_url: String,
}

/// 下拉选择框用, 只含 id 与名称
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerField {
    pub id: String,
    pub name: String,
}

/// 客户列表页的聚合行 (金额单位: 分)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomersTableRaw {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image_url: String,
    pub total_invoices: i64,
    pub total_pending: i64,
    pub total_paid: i64,
}

/// 客户列表页的聚合行, 金额已格式化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedCustomersTable {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image_url: String,
    pub total_invoices: i64,
    pub total_pending: String,
    pub total_paid: String,
}
