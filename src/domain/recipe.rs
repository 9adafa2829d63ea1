// ==========================================
// 小批量生产核算系统 - 配方领域模型
// ==========================================
// 对齐: db.rs recipe / recipe_ingredient / recipe_component 表
// 红线: 子配方引用以 recipe_id 显式邻接表表达，不持共享可变反向引用；
//       环与深度约束在遍历时强制（写入时不校验，见 resolver）
// ==========================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// RecipeIngredient - 配方直接物料需求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub material_id: String,         // 关联 material（FK）
    pub quantity_per_batch: Decimal, // 单批次用量
}

// ==========================================
// RecipeComponent - 子配方引用
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeComponent {
    pub component_recipe_id: String, // 被引用配方（FK）
    pub multiplier: Decimal,         // 单批次引用倍数
}

// ==========================================
// Recipe - 配方聚合
// ==========================================
// 红线: 外部目录子系统维护，本核心只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    // ===== 主键 =====
    pub recipe_id: String, // 配方唯一标识（UUID）

    // ===== 基础信息 =====
    pub name: String,              // 显示名称
    pub yield_quantity: Decimal,   // 单批次产出量
    pub yield_unit: Option<String>, // 产出单位（如 个 / 份）

    // ===== 结构 =====
    pub ingredients: Vec<RecipeIngredient>, // 直接物料需求
    pub components: Vec<RecipeComponent>,   // 子配方引用（邻接表）

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}
