// ==========================================
// 小批量生产核算系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 金额精度
// ==========================================
// 红线: 全系统只有一条舍入规则，逐笔扣减时即时舍入，
//       使审计行合计与落库总额严格相等

/// 金额小数位数（默认值，可经 config_kv 覆写）
pub const COST_SCALE: u32 = 4;

/// 统一金额舍入（四舍五入，远离零）
pub fn round_cost(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

// ==========================================
// 生产事务阶段 (Run Phase)
// ==========================================
// 状态机: INITIATED → CHECKING → (CONSUMING → RECORDED) | ABORTED
// 用途: 编排器结构化日志的阶段标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Initiated, // 已受理
    Checking,  // 库存校验中
    Consuming, // FIFO 扣减中
    Recorded,  // 已落账
    Aborted,   // 已中止（预检拒绝或回滚）
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Initiated => write!(f, "INITIATED"),
            RunPhase::Checking => write!(f, "CHECKING"),
            RunPhase::Consuming => write!(f, "CONSUMING"),
            RunPhase::Recorded => write!(f, "RECORDED"),
            RunPhase::Aborted => write!(f, "ABORTED"),
        }
    }
}

// ==========================================
// 成本口径 (Cost Basis)
// ==========================================
// 红线: 估算口径与实际口径不得混用
// - Estimated: 执行前，按当前物料均价推算
// - Actual:    执行后，按实际消耗批次回溯
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostBasis {
    Estimated, // 估算成本
    Actual,    // 实际成本
}

impl fmt::Display for CostBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostBasis::Estimated => write!(f, "ESTIMATED"),
            CostBasis::Actual => write!(f, "ACTUAL"),
        }
    }
}
