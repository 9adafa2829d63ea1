// ==========================================
// 小批量生产核算系统 - 成本核算引擎
// ==========================================
// 红线: 估算口径（Estimated，执行前均价）与实际口径（Actual，
//       执行后批次回溯）用不同结果类型表达，调用方无法混用
// 红线: 纯只读，绝不触碰库存台账
// 说明: 定价策略归外部——本核心只消费 MaterialPriceSource 查价
// ==========================================

use crate::domain::production::ConsumptionRecord;
use crate::domain::types::{round_cost, CostBasis};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::resolver::RecipeResolver;
use crate::repository::error::RepositoryResult;
use crate::repository::lot_repo::LotRepository;
use crate::repository::production_repo::ProductionRunRepository;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ==========================================
// MaterialPriceSource - 物料单价查询接口
// ==========================================
/// 物料单价查询接口
///
/// 定价策略（均价/最近价/外部报价）由实现方决定；
/// 返回 None 表示该物料当前无已知单价
pub trait MaterialPriceSource {
    fn unit_cost(&self, conn: &Connection, material_id: &str) -> RepositoryResult<Option<Decimal>>;
}

// ==========================================
// LotPriceSource - 批次推导单价
// ==========================================
/// 以现存批次推导单价：
/// - 有余量批次 → 按余量加权均价
/// - 全部耗尽 → 回退最近入库批次单价
/// - 无任何批次 → None
pub struct LotPriceSource;

impl MaterialPriceSource for LotPriceSource {
    fn unit_cost(&self, conn: &Connection, material_id: &str) -> RepositoryResult<Option<Decimal>> {
        let lots = LotRepository::list_by_material_fifo_on(conn, material_id)?;
        if lots.is_empty() {
            return Ok(None);
        }

        let live: Vec<_> = lots.iter().filter(|lot| !lot.is_depleted()).collect();
        if live.is_empty() {
            // FIFO 升序列表的末位即最近入库批次
            return Ok(lots.last().map(|lot| lot.unit_cost));
        }

        let total_qty: Decimal = live.iter().map(|lot| lot.remaining_quantity).sum();
        let weighted: Decimal = live
            .iter()
            .map(|lot| lot.remaining_quantity * lot.unit_cost)
            .sum();
        Ok(Some(weighted / total_qty))
    }
}

// ==========================================
// EstimatedCost - 估算成本结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedCostLine {
    pub material_id: String,        // 物料
    pub quantity: Decimal,          // 展开后总需求量
    pub unit_cost: Option<Decimal>, // 当前单价（None = 无已知单价，按 0 计）
    pub cost: Decimal,              // 行成本（已舍入）
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedCost {
    pub basis: CostBasis, // 恒为 Estimated
    pub recipe_id: String,
    pub batches: u32,
    pub total_cost: Decimal,
    pub lines: Vec<EstimatedCostLine>,
}

// ==========================================
// ActualCost - 实际成本结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualCost {
    pub basis: CostBasis, // 恒为 Actual
    pub run_id: String,
    pub recipe_id: String,
    pub total_cost: Decimal,
    pub unit_cost: Decimal,
    pub lines: Vec<ConsumptionRecord>, // 落账审计行，逐行可加和核对
}

// ==========================================
// CostEngine - 成本核算引擎
// ==========================================
pub struct CostEngine {
    resolver: RecipeResolver,
    cost_scale: u32,
}

impl CostEngine {
    /// 创建新的成本引擎实例
    ///
    /// # 参数
    /// - resolver: 配方图解析器（复用其环/深度保护）
    /// - cost_scale: 金额小数位数
    pub fn new(resolver: RecipeResolver, cost_scale: u32) -> Self {
        Self {
            resolver,
            cost_scale,
        }
    }

    /// 估算成本（执行前口径）
    ///
    /// # 说明
    /// - 经解析器展开为扁平需求后逐物料查价——与"子配方递归乘加"
    ///   在分配律下结果一致，且天然继承环/深度保护
    /// - 无已知单价的物料计 0 并告警，不使整次估算失败
    pub fn estimate_cost(
        &self,
        conn: &Connection,
        prices: &impl MaterialPriceSource,
        recipe_id: &str,
        batches: u32,
    ) -> EngineResult<EstimatedCost> {
        if batches == 0 {
            return Err(EngineError::InvalidInput(
                "batches 必须大于 0".to_string(),
            ));
        }

        let agg = self
            .resolver
            .aggregate(conn, recipe_id, Decimal::from(batches))?;

        let mut lines = Vec::new();
        let mut total_cost = Decimal::ZERO;
        for (material_id, quantity) in &agg.totals {
            let unit_cost = prices.unit_cost(conn, material_id)?;
            let cost = match unit_cost {
                Some(price) => round_cost(*quantity * price, self.cost_scale),
                None => {
                    warn!(material_id = %material_id, "物料无已知单价，估算按 0 计");
                    Decimal::ZERO
                }
            };
            total_cost += cost;
            lines.push(EstimatedCostLine {
                material_id: material_id.clone(),
                quantity: *quantity,
                unit_cost,
                cost,
            });
        }

        info!(
            recipe_id = %recipe_id,
            batches,
            total_cost = %total_cost,
            "成本估算完成"
        );

        Ok(EstimatedCost {
            basis: CostBasis::Estimated,
            recipe_id: recipe_id.to_string(),
            batches,
            total_cost,
            lines,
        })
    }

    /// 实际成本（执行后口径，按消耗记录回溯）
    pub fn actual_cost(&self, conn: &Connection, run_id: &str) -> EngineResult<ActualCost> {
        let run = ProductionRunRepository::find_by_id_on(conn, run_id)?.ok_or_else(|| {
            EngineError::NotFound {
                entity: "ProductionRun".to_string(),
                id: run_id.to_string(),
            }
        })?;
        let lines = ProductionRunRepository::list_consumptions_on(conn, run_id)?;

        Ok(ActualCost {
            basis: CostBasis::Actual,
            run_id: run.run_id,
            recipe_id: run.recipe_id,
            total_cost: run.total_cost,
            unit_cost: run.unit_cost,
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{seed_lot, seed_material, seed_recipe, setup_conn};
    use rust_decimal_macros::dec;

    #[test]
    fn test_lot_price_source_weighted_average() {
        let conn = setup_conn();
        seed_material(&conn, "flour", "面粉", "杯");
        seed_lot(&conn, "l1", "flour", dec!(5), dec!(0.40), "2025-01-01T00:00:00Z");
        seed_lot(&conn, "l2", "flour", dec!(5), dec!(0.60), "2025-01-15T00:00:00Z");

        let price = LotPriceSource.unit_cost(&conn, "flour").unwrap().unwrap();
        assert_eq!(price, dec!(0.50));
    }

    #[test]
    fn test_lot_price_source_falls_back_to_latest_when_depleted() {
        let conn = setup_conn();
        seed_material(&conn, "flour", "面粉", "杯");
        seed_lot(&conn, "l1", "flour", dec!(0), dec!(0.40), "2025-01-01T00:00:00Z");
        seed_lot(&conn, "l2", "flour", dec!(0), dec!(0.60), "2025-01-15T00:00:00Z");

        let price = LotPriceSource.unit_cost(&conn, "flour").unwrap().unwrap();
        assert_eq!(price, dec!(0.60));
    }

    #[test]
    fn test_lot_price_source_none_without_lots() {
        let conn = setup_conn();
        seed_material(&conn, "flour", "面粉", "杯");
        assert!(LotPriceSource.unit_cost(&conn, "flour").unwrap().is_none());
    }

    #[test]
    fn test_estimate_cost_nested_recipe() {
        let conn = setup_conn();
        seed_material(&conn, "sugar", "砂糖", "杯");
        seed_lot(&conn, "l1", "sugar", dec!(10), dec!(2), "2025-01-01T00:00:00Z");
        seed_recipe(&conn, "sponge", "海绵层", dec!(1), &[("sugar", dec!(1))], &[]);
        seed_recipe(&conn, "frosting", "糖霜", dec!(1), &[("sugar", dec!(0.5))], &[]);
        seed_recipe(
            &conn,
            "cake",
            "生日蛋糕",
            dec!(1),
            &[],
            &[("sponge", dec!(2)), ("frosting", dec!(1))],
        );

        let engine = CostEngine::new(RecipeResolver::default(), 4);
        let estimate = engine
            .estimate_cost(&conn, &LotPriceSource, "cake", 1)
            .unwrap();

        assert_eq!(estimate.basis, CostBasis::Estimated);
        // 糖 2.5 杯 × $2 = $5
        assert_eq!(estimate.total_cost, dec!(5.0000));
        assert_eq!(estimate.lines.len(), 1);
        assert_eq!(estimate.lines[0].quantity, dec!(2.5));
    }

    #[test]
    fn test_estimate_cost_unpriced_material_counts_zero() {
        let conn = setup_conn();
        seed_material(&conn, "saffron", "藏红花", "g");
        seed_recipe(&conn, "r", "R", dec!(1), &[("saffron", dec!(1))], &[]);

        let engine = CostEngine::new(RecipeResolver::default(), 4);
        let estimate = engine.estimate_cost(&conn, &LotPriceSource, "r", 2).unwrap();
        assert_eq!(estimate.total_cost, dec!(0));
        assert!(estimate.lines[0].unit_cost.is_none());
    }

    #[test]
    fn test_estimate_cost_propagates_cycle_error() {
        let conn = setup_conn();
        seed_recipe(&conn, "a", "A", dec!(1), &[], &[("b", dec!(1))]);
        seed_recipe(&conn, "b", "B", dec!(1), &[], &[("a", dec!(1))]);

        let engine = CostEngine::new(RecipeResolver::default(), 4);
        assert!(matches!(
            engine.estimate_cost(&conn, &LotPriceSource, "a", 1).unwrap_err(),
            EngineError::CircularReference { .. }
        ));
    }

    #[test]
    fn test_actual_cost_unknown_run() {
        let conn = setup_conn();
        let engine = CostEngine::new(RecipeResolver::default(), 4);
        assert!(matches!(
            engine.actual_cost(&conn, "nope").unwrap_err(),
            EngineError::NotFound { .. }
        ));
    }
}
