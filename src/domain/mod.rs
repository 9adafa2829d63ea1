// ==========================================
// 小批量生产核算系统 - 领域层
// ==========================================
// 职责: 定义实体结构与领域类型，不含数据访问
// 红线: 数量/金额一律 Decimal，禁止 f64
// ==========================================

pub mod material;
pub mod production;
pub mod recipe;
pub mod types;

// 重导出核心实体
pub use material::{Lot, Material};
pub use production::{AggregatedRequirement, ConsumptionRecord, ProductionRun, Shortfall};
pub use recipe::{Recipe, RecipeComponent, RecipeIngredient};
pub use types::{CostBasis, RunPhase};
