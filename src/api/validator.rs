// ==========================================
// 小批量生产核算系统 - API层输入校验
// ==========================================
// 职责: 入口参数的形式校验（空白 id、负数量）
// 说明: 业务语义校验（存在性、充足性）归引擎层
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use rust_decimal::Decimal;

/// 校验标识符非空白
pub fn require_id(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{field} 不得为空")));
    }
    Ok(())
}

/// 校验数量非负
pub fn require_non_negative(field: &str, value: Decimal) -> ApiResult<()> {
    if value < Decimal::ZERO {
        return Err(ApiError::InvalidInput(format!(
            "{field} 不得为负: {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_require_id_rejects_blank() {
        assert!(require_id("recipe_id", "  ").is_err());
        assert!(require_id("recipe_id", "cookie").is_ok());
    }

    #[test]
    fn test_require_non_negative() {
        assert!(require_non_negative("quantity", dec!(-0.1)).is_err());
        assert!(require_non_negative("quantity", dec!(0)).is_ok());
    }
}
