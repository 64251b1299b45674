use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 发票状态, 只有两种取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }
}

/// 发票表 (invoices)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub customer_id: String,
    pub amount: i64, // 单位: 分
    pub date: NaiveDate,
    pub status: InvoiceStatus,
}

/// 最新发票 - 关联客户字段已平铺
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LatestInvoiceRaw {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub email: String,
    pub amount: i64,
}

/// 最新发票 - 金额已格式化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestInvoice {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub email: String,
    pub amount: String,
}

/// 发票列表页的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicesTableRow {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub email: String,
    pub image_url: String,
    pub date: NaiveDate,
    pub amount: i64,
    pub status: InvoiceStatus,
}

/// 编辑表单用的发票 (数据库原始行, 金额为分)
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceFormRaw {
    pub id: String,
    pub customer_id: String,
    pub amount: i64,
    pub status: InvoiceStatus,
}

/// 编辑表单用的发票, 金额单位为元
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceForm {
    pub id: String,
    pub customer_id: String,
    pub amount: BigDecimal,
    pub status: InvoiceStatus,
}

impl From<InvoiceFormRaw> for InvoiceForm {
    fn from(raw: InvoiceFormRaw) -> Self {
        Self {
            id: raw.id,
            customer_id: raw.customer_id,
            amount: cents_to_dollars(raw.amount),
            status: raw.status,
        }
    }
}

/// 分 -> 元, 精确到两位小数 (125000 -> 1250.00)
pub fn cents_to_dollars(cents: i64) -> BigDecimal {
    BigDecimal::new(cents.into(), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cents_convert_exactly() {
        let dollars = cents_to_dollars(125000);
        assert_eq!(dollars, BigDecimal::from(1250));
        assert_eq!(dollars.to_string(), "1250.00");
        assert_eq!(cents_to_dollars(15795), BigDecimal::from_str("157.95").unwrap());
    }

    #[test]
    fn status_round_trips_lowercase() {
        let status: InvoiceStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(status, InvoiceStatus::Paid);
        assert!(serde_json::from_str::<InvoiceStatus>("\"void\"").is_err());
        assert_eq!(InvoiceStatus::Pending.as_str(), "pending");
    }
}
