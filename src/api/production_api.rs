// ==========================================
// 小批量生产核算系统 - 生产业务接口
// ==========================================
// 职责: 面向外部展示层的结构化入口——只返回结构化结果/错误，
//       不做任何用户界面格式化、确认提示或重试
// ==========================================

use crate::api::error::ApiResult;
use crate::api::validator::{require_id, require_non_negative};
use crate::config::CoreConfig;
use crate::domain::production::{ConsumptionRecord, ProductionRun};
use crate::engine::cost::{ActualCost, CostEngine, EstimatedCost, LotPriceSource};
use crate::engine::orchestrator::{
    ProductionOrchestrator, RecordProductionRequest,
};
use crate::engine::resolver::RecipeResolver;
use crate::repository::error::RepositoryError;
use crate::repository::production_repo::ProductionRunRepository;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};

// ==========================================
// ProductionRunDetail - 生产记录明细视图
// ==========================================
// 说明: 全部以持久标识符（UUID）为键，可直接序列化供外部导出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRunDetail {
    pub run: ProductionRun,
    pub consumptions: Vec<ConsumptionRecord>,
}

// ==========================================
// ProductionApi - 生产业务接口
// ==========================================
pub struct ProductionApi {
    conn: Arc<Mutex<Connection>>,
    orchestrator: ProductionOrchestrator,
    cost_engine: CostEngine,
}

impl ProductionApi {
    /// 创建新的 ProductionApi 实例
    ///
    /// # 参数
    /// - conn: 共享连接
    /// - config: 核心配置快照
    pub fn new(conn: Arc<Mutex<Connection>>, config: &CoreConfig) -> Self {
        Self {
            orchestrator: ProductionOrchestrator::new(Arc::clone(&conn), config),
            cost_engine: CostEngine::new(
                RecipeResolver::new(config.max_recipe_depth),
                config.cost_scale,
            ),
            conn,
        }
    }

    fn lock(&self) -> ApiResult<std::sync::MutexGuard<'_, Connection>> {
        Ok(self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?)
    }

    /// 记录一次生产执行（原子事务，刻意不幂等）
    pub fn record_production(
        &self,
        recipe_id: &str,
        batches: u32,
        actual_yield: Decimal,
        notes: Option<String>,
    ) -> ApiResult<ProductionRunDetail> {
        require_id("recipe_id", recipe_id)?;
        require_non_negative("actual_yield", actual_yield)?;

        let outcome = self.orchestrator.record_production(RecordProductionRequest {
            recipe_id: recipe_id.to_string(),
            batches,
            actual_yield,
            notes,
        })?;

        Ok(ProductionRunDetail {
            run: outcome.run,
            consumptions: outcome.consumptions,
        })
    }

    /// 估算成本（执行前口径，按批次现价推导）
    pub fn estimate_cost(&self, recipe_id: &str, batches: u32) -> ApiResult<EstimatedCost> {
        require_id("recipe_id", recipe_id)?;
        let conn = self.lock()?;
        Ok(self
            .cost_engine
            .estimate_cost(&conn, &LotPriceSource, recipe_id, batches)?)
    }

    /// 实际成本（执行后口径，按消耗记录回溯）
    pub fn actual_cost(&self, run_id: &str) -> ApiResult<ActualCost> {
        require_id("run_id", run_id)?;
        let conn = self.lock()?;
        Ok(self.cost_engine.actual_cost(&conn, run_id)?)
    }

    /// 查询单条生产记录及其消耗明细
    pub fn get_run(&self, run_id: &str) -> ApiResult<ProductionRunDetail> {
        require_id("run_id", run_id)?;
        let conn = self.lock()?;
        let run = ProductionRunRepository::find_by_id_on(&conn, run_id)?.ok_or_else(|| {
            crate::api::error::ApiError::NotFound {
                entity: "ProductionRun".to_string(),
                id: run_id.to_string(),
            }
        })?;
        let consumptions = ProductionRunRepository::list_consumptions_on(&conn, run_id)?;
        Ok(ProductionRunDetail { run, consumptions })
    }

    /// 列出全部生产记录（生产时间倒序）
    pub fn list_runs(&self) -> ApiResult<Vec<ProductionRun>> {
        let repo = ProductionRunRepository::from_connection(Arc::clone(&self.conn));
        Ok(repo.list_all()?)
    }

    /// 导出单条生产历史（JSON，持久标识符为键，供外部导出器重建全史）
    pub fn export_run_json(&self, run_id: &str) -> ApiResult<serde_json::Value> {
        let detail = self.get_run(run_id)?;
        Ok(json!({
            "run": detail.run,
            "consumptions": detail.consumptions,
        }))
    }
}
