// ==========================================
// 小批量生产核算系统 - 生产记录领域模型
// ==========================================
// 对齐: db.rs production_run / consumption_record 表
// 红线: ProductionRun 与其 ConsumptionRecord 同事务生死，
//       不允许孤儿消耗记录
// ==========================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ProductionRun - 生产记录
// ==========================================
// 用途: "做 N 批配方 R"的一次已完成执行
// 约束: 只由编排器在事务成功终点创建，不存在半成品行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRun {
    // ===== 主键与关联 =====
    pub run_id: String,    // 生产记录唯一标识（UUID）
    pub recipe_id: String, // 关联 recipe（FK）

    // ===== 产量 =====
    pub batches: u32,            // 请求批次数（> 0）
    pub expected_yield: Decimal, // 预期产出（yield_quantity × batches）
    pub actual_yield: Decimal,   // 实际产出（≥ 0，0 = 报废批次，合法）

    // ===== 成本 =====
    pub total_cost: Decimal, // 原料总成本（= 消耗记录合计）
    pub unit_cost: Decimal,  // 单位成本（actual_yield=0 时约定为 0）

    // ===== 其他 =====
    pub notes: Option<String>, // 自由备注

    // ===== 时间信息 =====
    pub produced_at: DateTime<Utc>, // 生产时间
    pub created_at: DateTime<Utc>,  // 记录创建时间
}

impl ProductionRun {
    /// 产量差异（实际 - 预期；正值=超产，负值=欠产）
    pub fn yield_variance(&self) -> Decimal {
        self.actual_yield - self.expected_yield
    }
}

// ==========================================
// ConsumptionRecord - 消耗记录
// ==========================================
// 用途: 审计行，把一次生产与其消耗的物料/数量/成本绑定
// 约束: 落库后不可变；由一个或多个批次扣减汇总而来
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    // ===== 主键与关联 =====
    pub record_id: String,   // 消耗记录唯一标识（UUID）
    pub run_id: String,      // 所属生产记录（FK）
    pub material_id: String, // 关联 material（FK）

    // ===== 数量与成本 =====
    pub quantity: Decimal,   // 消耗总量
    pub total_cost: Decimal, // 归集总成本（逐批次舍入后合计）

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
}

// ==========================================
// AggregatedRequirement - 展开后物料需求
// ==========================================
// 用途: 配方图解析器的瞬态输出，material_id → 总需求量
// 说明: BTreeMap 保证遍历顺序确定（预检短缺清单顺序稳定）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedRequirement {
    pub recipe_id: String,                 // 根配方
    pub batch_multiplier: Decimal,         // 请求批次倍数
    pub totals: BTreeMap<String, Decimal>, // material_id → 总需求量
}

impl AggregatedRequirement {
    /// 是否无任何物料需求（合法：空配方）
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

// ==========================================
// Shortfall - 单物料短缺明细
// ==========================================
// 用途: 预检阶段一次性汇总"完整采购缺口"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortfall {
    pub material_id: String,   // 短缺物料
    pub material_name: String, // 显示名称（可解释性）
    pub needed: Decimal,       // 需求量
    pub available: Decimal,    // 现有量
    pub missing: Decimal,      // 缺口（needed - available）
}
