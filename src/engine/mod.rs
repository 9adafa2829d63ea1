// ==========================================
// 小批量生产核算系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎
// 红线: Engine 不拼 SQL（数据访问经仓储层），所有拒绝必须输出原因
// 红线: resolver/cost 纯只读；唯一落笔入口是编排器持有的单一事务
// ==========================================

pub mod cost;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testutil;

// 重导出核心引擎
pub use cost::{
    ActualCost, CostEngine, EstimatedCost, EstimatedCostLine, LotPriceSource, MaterialPriceSource,
};
pub use error::{EngineError, EngineResult};
pub use ledger::{AvailabilityReport, InventoryLedger, LotDraw};
pub use orchestrator::{ProductionOrchestrator, ProductionOutcome, RecordProductionRequest};
pub use resolver::{RecipeResolver, DEFAULT_MAX_RECIPE_DEPTH};
