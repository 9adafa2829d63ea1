// ==========================================
// 小批量生产核算系统 - 物料与批次领域模型
// ==========================================
// 对齐: db.rs material / lot 表
// ==========================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Material - 物料主数据
// ==========================================
// 红线: 外部目录子系统维护，本核心只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    // ===== 主键 =====
    pub material_id: String, // 物料唯一标识（UUID）

    // ===== 基础信息 =====
    pub name: String, // 显示名称
    pub unit: String, // 计量单位（如 g / ml / 杯）

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}

// ==========================================
// Lot - 库存批次
// ==========================================
// 红线: 外部采购事件写入；本核心只扣减 remaining_quantity，
//       只减不增、归零不删（审计追溯）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    // ===== 主键与关联 =====
    pub lot_id: String,      // 批次唯一标识（UUID）
    pub material_id: String, // 关联 material（FK）

    // ===== 数量与成本 =====
    pub initial_quantity: Decimal,   // 入库数量（不变）
    pub remaining_quantity: Decimal, // 剩余数量（非负，只减）
    pub unit_cost: Decimal,          // 单位成本

    // ===== 时间信息 =====
    pub acquired_at: DateTime<Utc>, // 入库时间（FIFO 主排序键）

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}

impl Lot {
    /// 批次是否已耗尽
    pub fn is_depleted(&self) -> bool {
        self.remaining_quantity.is_zero()
    }
}
