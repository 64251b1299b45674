//! 展示层辅助函数: 货币、日期、分页与图表坐标轴

use crate::models::Revenue;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;

/// 货币格式化接口 (纯函数, 无副作用)
pub trait CurrencyFormatter: Send + Sync {
    /// 输入单位为分
    fn format(&self, cents: i64) -> String;
}

/// 美元格式: 125000 -> `$1,250.00`
#[derive(Debug, Clone, Copy, Default)]
pub struct UsdFormatter;

impl CurrencyFormatter for UsdFormatter {
    fn format(&self, cents: i64) -> String {
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();
        let dollars = (abs / 100).to_string();

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (idx, ch) in dollars.chars().enumerate() {
            if idx > 0 && (dollars.len() - idx) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!("{sign}${grouped}.{:02}", abs % 100)
    }
}

/// `2022-12-06` -> `Dec 6, 2022`
pub fn format_date_to_local(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// 分页条上的一个位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageToken::Page(n) => write!(f, "{n}"),
            PageToken::Ellipsis => f.write_str("..."),
        }
    }
}

impl Serialize for PageToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageToken::Page(n) => serializer.serialize_u32(*n),
            PageToken::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

/// 生成分页条
///
/// 不超过 7 页时全部显示; 否则保留首尾, 当前页附近的页码, 其余折叠为省略号。
pub fn generate_pagination(current_page: u32, total_pages: u32) -> Vec<PageToken> {
    use PageToken::{Ellipsis, Page};

    if total_pages <= 7 {
        return (1..=total_pages).map(Page).collect();
    }

    if current_page <= 3 {
        return vec![
            Page(1),
            Page(2),
            Page(3),
            Ellipsis,
            Page(total_pages - 1),
            Page(total_pages),
        ];
    }

    if current_page >= total_pages - 2 {
        return vec![
            Page(1),
            Page(2),
            Ellipsis,
            Page(total_pages - 2),
            Page(total_pages - 1),
            Page(total_pages),
        ];
    }

    vec![
        Page(1),
        Ellipsis,
        Page(current_page - 1),
        Page(current_page),
        Page(current_page + 1),
        Ellipsis,
        Page(total_pages),
    ]
}

/// 营收图表的纵轴
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YAxis {
    pub labels: Vec<String>,
    pub top_label: i64,
}

/// 纵轴顶端取最大营收向上取整到千位, 每 1000 一个刻度
pub fn generate_y_axis(revenue: &[Revenue]) -> YAxis {
    let highest = revenue.iter().map(|r| r.revenue).max().unwrap_or(0).max(0);
    let top_label = round_up_to_thousand(highest);

    let labels = (0..=top_label / 1000)
        .rev()
        .map(|k| format!("${k}K"))
        .collect();

    YAxis { labels, top_label }
}

/// 向上取整到千位, 越界时饱和为 i64::MAX
fn round_up_to_thousand(value: i64) -> i64 {
    let rounded = value.unsigned_abs().div_ceil(1000).saturating_mul(1000);
    i64::try_from(rounded).unwrap_or(i64::MAX)
}
