// ==========================================
// 小批量生产核算系统 - 行值转换辅助
// ==========================================
// 约定: 数量/金额以 Decimal 规范化字符串落库（TEXT 列），
//       时间以 RFC3339 落库；读取一律严格解析，
//       解析失败即 FieldValueError（不静默兜底，FIFO 排序依赖 acquired_at）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

/// TEXT 列 → Decimal（严格解析）
pub(crate) fn decimal_from_text(field: &str, raw: &str) -> RepositoryResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("非法 Decimal 字符串 '{raw}': {e}"),
    })
}

/// TEXT 列 → DateTime<Utc>（严格解析 RFC3339）
pub(crate) fn datetime_from_text(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("非法 RFC3339 时间 '{raw}': {e}"),
        })
}
