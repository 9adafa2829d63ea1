// ==========================================
// 小批量生产核算系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 生产核算核心 (配方展开 / 库存台账 / 成本核算 / 生产事务)
// 边界: 目录维护、报表渲染、导入导出由外部子系统负责
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CostBasis, RunPhase, COST_SCALE};

// 领域实体
pub use domain::{
    AggregatedRequirement, ConsumptionRecord, Lot, Material, ProductionRun, Recipe,
    RecipeComponent, RecipeIngredient, Shortfall,
};

// 引擎
pub use engine::{
    ActualCost, AvailabilityReport, CostEngine, EstimatedCost, InventoryLedger, LotDraw,
    LotPriceSource, MaterialPriceSource, ProductionOrchestrator, ProductionOutcome,
    RecipeResolver, RecordProductionRequest,
};

// API
pub use api::{InventoryApi, ProductionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "小批量生产核算系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================

// 确保编译时所有模块可见
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
