// ==========================================
// 小批量生产核算系统 - 生产事务编排器
// ==========================================
// 用途: record_production 顶层入口——展开需求、校验库存、
//       FIFO 扣减、落账生产记录与消耗记录
// 状态机: INITIATED → CHECKING → (CONSUMING → RECORDED) | ABORTED
// 红线: 步骤 4 起全部动作在单一事务内——批次扣减、production_run、
//       consumption_record 同生共死；事务句柄提前 drop 即整体回滚
// 红线: 预检失败（参数/短缺）零落库，与消耗中失败的回滚语义区分
// 红线: 刻意不幂等——重复提交产生两次生产事件；确认防抖归外部调用方
// ==========================================

use crate::config::CoreConfig;
use crate::domain::production::{ConsumptionRecord, ProductionRun, Shortfall};
use crate::domain::types::{round_cost, RunPhase};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::ledger::InventoryLedger;
use crate::engine::resolver::RecipeResolver;
use crate::repository::error::RepositoryError;
use crate::repository::production_repo::ProductionRunRepository;
use crate::repository::recipe_repo::RecipeRepository;
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// RecordProductionRequest - 生产记录请求
// ==========================================
#[derive(Debug, Clone)]
pub struct RecordProductionRequest {
    pub recipe_id: String,     // 配方
    pub batches: u32,          // 批次数（> 0）
    pub actual_yield: Decimal, // 实际产出（≥ 0；0 = 报废批次，合法且仍记成本）
    pub notes: Option<String>, // 自由备注
}

// ==========================================
// ProductionOutcome - 生产记录结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ProductionOutcome {
    pub run: ProductionRun,
    pub consumptions: Vec<ConsumptionRecord>,
}

// ==========================================
// ProductionOrchestrator - 生产事务编排器
// ==========================================
pub struct ProductionOrchestrator {
    conn: Arc<Mutex<Connection>>,
    resolver: RecipeResolver,
    ledger: InventoryLedger,
    cost_scale: u32,

    // 测试钩子: 扣减完成后、落账前注入失败，验证整体回滚
    #[cfg(test)]
    pub(crate) fail_before_record: bool,
}

impl ProductionOrchestrator {
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - conn: 共享连接（事务边界由本编排器持有）
    /// - config: 核心配置（嵌套深度上限、金额精度）
    pub fn new(conn: Arc<Mutex<Connection>>, config: &CoreConfig) -> Self {
        Self {
            conn,
            resolver: RecipeResolver::new(config.max_recipe_depth),
            ledger: InventoryLedger::new(config.cost_scale),
            cost_scale: config.cost_scale,
            #[cfg(test)]
            fail_before_record: false,
        }
    }

    /// 记录一次生产执行
    ///
    /// # 流程
    /// 1. 参数校验（预检拒绝，零落库）
    /// 2. 配方展开为扁平物料需求
    /// 3. 逐物料校验库存，**汇总全部缺口**后才中止（一次暴露完整采购缺口）
    /// 4. 全部充足 → 单一事务内 FIFO 扣减 + 落账 run 与消耗记录
    /// 5. total_cost = 消耗合计；unit_cost = total/actual_yield，
    ///    actual_yield = 0 时按约定取 0（绝不除零）
    /// 6. actual_yield 超过预期产出记为差异，不拒绝
    pub fn record_production(
        &self,
        request: RecordProductionRequest,
    ) -> EngineResult<ProductionOutcome> {
        info!(
            phase = %RunPhase::Initiated,
            recipe_id = %request.recipe_id,
            batches = request.batches,
            actual_yield = %request.actual_yield,
            "受理生产记录请求"
        );

        // ==========================================
        // 步骤1: 参数校验（预检，零落库）
        // ==========================================
        if request.batches == 0 {
            warn!(phase = %RunPhase::Aborted, "批次数必须大于 0");
            return Err(EngineError::InvalidInput("batches 必须大于 0".to_string()));
        }
        if request.actual_yield < Decimal::ZERO {
            warn!(phase = %RunPhase::Aborted, "实际产出不得为负");
            return Err(EngineError::InvalidInput(format!(
                "actual_yield 不得为负: {}",
                request.actual_yield
            )));
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::Repository(RepositoryError::LockError(e.to_string())))?;
        // 单一事务覆盖读校验与全部落笔；任何错误路径提前返回即回滚
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let recipe = RecipeRepository::find_by_id_on(&tx, &request.recipe_id)?.ok_or_else(|| {
            EngineError::NotFound {
                entity: "Recipe".to_string(),
                id: request.recipe_id.clone(),
            }
        })?;

        // ==========================================
        // 步骤2: 配方展开
        // ==========================================
        let agg = self.resolver.aggregate(
            &tx,
            &request.recipe_id,
            Decimal::from(request.batches),
        )?;

        // ==========================================
        // 步骤3: 库存校验（汇总全部缺口）
        // ==========================================
        debug!(phase = %RunPhase::Checking, materials = agg.totals.len(), "开始库存校验");

        let mut shortfalls: Vec<Shortfall> = Vec::new();
        for (material_id, needed) in &agg.totals {
            let report = self.ledger.check_availability(&tx, material_id, *needed)?;
            if !report.sufficient {
                shortfalls.push(Shortfall {
                    material_id: report.material_id,
                    material_name: report.material_name,
                    needed: report.needed,
                    available: report.available,
                    missing: report.missing,
                });
            }
        }

        if !shortfalls.is_empty() {
            warn!(
                phase = %RunPhase::Aborted,
                shortfall_count = shortfalls.len(),
                "库存不足，预检拒绝（零落库）"
            );
            return Err(EngineError::InsufficientInventory { shortfalls });
        }

        // ==========================================
        // 步骤4: FIFO 扣减（consume_fifo 自行复核充足性）
        // ==========================================
        let run_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(phase = %RunPhase::Consuming, run_id = %run_id, "开始 FIFO 扣减");

        let mut consumptions: Vec<ConsumptionRecord> = Vec::new();
        let mut total_cost = Decimal::ZERO;
        for (material_id, needed) in &agg.totals {
            if needed.is_zero() {
                continue;
            }
            let draws = self.ledger.consume_fifo(&tx, material_id, *needed)?;
            let material_cost: Decimal = draws.iter().map(|d| d.cost).sum();
            total_cost += material_cost;
            consumptions.push(ConsumptionRecord {
                record_id: Uuid::new_v4().to_string(),
                run_id: run_id.clone(),
                material_id: material_id.clone(),
                quantity: *needed,
                total_cost: material_cost,
                created_at: now,
            });
        }

        #[cfg(test)]
        if self.fail_before_record {
            return Err(EngineError::Internal(
                "注入故障: 扣减完成后、落账前".to_string(),
            ));
        }

        // ==========================================
        // 步骤5: 成本归集与落账
        // ==========================================
        let unit_cost = if request.actual_yield > Decimal::ZERO {
            round_cost(total_cost / request.actual_yield, self.cost_scale)
        } else {
            // 报废批次仍记成本，但约定单位成本为 0（绝不除零）
            Decimal::ZERO
        };

        let run = ProductionRun {
            run_id: run_id.clone(),
            recipe_id: request.recipe_id.clone(),
            batches: request.batches,
            expected_yield: recipe.yield_quantity * Decimal::from(request.batches),
            actual_yield: request.actual_yield,
            total_cost,
            unit_cost,
            notes: request.notes,
            produced_at: now,
            created_at: now,
        };

        ProductionRunRepository::insert_with_consumptions_on(&tx, &run, &consumptions)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            phase = %RunPhase::Recorded,
            run_id = %run_id,
            total_cost = %run.total_cost,
            unit_cost = %run.unit_cost,
            yield_variance = %run.yield_variance(),
            "生产记录落账"
        );

        Ok(ProductionOutcome { run, consumptions })
    }
}
