// ==========================================
// 小批量生产核算系统 - 库存台账引擎
// ==========================================
// 职责: 可用量查询 + 先进先出扣减
// 红线: consume_fifo 落笔前必须独立复核充足性——不信任调用方的预检；
//       不足即报错且零落库
// 红线: 成本逐笔扣减即时舍入，全系统唯一舍入规则（见 domain::types）
// ==========================================

use crate::domain::material::Material;
use crate::domain::production::Shortfall;
use crate::domain::types::round_cost;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::lot_repo::LotRepository;
use crate::repository::material_repo::MaterialRepository;
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ==========================================
// AvailabilityReport - 可用量报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub material_id: String,   // 物料
    pub material_name: String, // 显示名称（可解释性）
    pub needed: Decimal,       // 需求量
    pub available: Decimal,    // 全批次剩余量合计
    pub missing: Decimal,      // 缺口（不足时 > 0）
    pub sufficient: bool,      // 是否充足
}

// ==========================================
// LotDraw - 单批次扣减明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: String,          // 被扣减批次
    pub quantity_taken: Decimal, // 本批次取用量
    pub unit_cost: Decimal,      // 批次单位成本
    pub cost: Decimal,           // 取用成本（已按统一规则舍入）
}

// ==========================================
// InventoryLedger - 库存台账引擎
// ==========================================
pub struct InventoryLedger {
    cost_scale: u32,
}

impl InventoryLedger {
    /// 创建新的台账引擎实例
    ///
    /// # 参数
    /// - cost_scale: 金额小数位数
    pub fn new(cost_scale: u32) -> Self {
        Self { cost_scale }
    }

    /// 物料存在性校验
    fn require_material(conn: &Connection, material_id: &str) -> EngineResult<Material> {
        MaterialRepository::find_by_id_on(conn, material_id)?.ok_or_else(|| {
            EngineError::NotFound {
                entity: "Material".to_string(),
                id: material_id.to_string(),
            }
        })
    }

    /// 查询物料可用量（纯读，零落库）
    ///
    /// # 参数
    /// - conn: 连接/事务句柄
    /// - material_id: 物料
    /// - needed: 需求量（≥ 0）
    pub fn check_availability(
        &self,
        conn: &Connection,
        material_id: &str,
        needed: Decimal,
    ) -> EngineResult<AvailabilityReport> {
        if needed < Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "需求量不得为负: material_id={material_id}, needed={needed}"
            )));
        }

        let material = Self::require_material(conn, material_id)?;
        let lots = LotRepository::list_by_material_fifo_on(conn, material_id)?;
        let available: Decimal = lots.iter().map(|lot| lot.remaining_quantity).sum();
        let missing = if available < needed {
            needed - available
        } else {
            Decimal::ZERO
        };

        debug!(
            material_id = %material_id,
            needed = %needed,
            available = %available,
            missing = %missing,
            "可用量查询"
        );

        Ok(AvailabilityReport {
            material_id: material_id.to_string(),
            material_name: material.name,
            needed,
            available,
            sufficient: missing.is_zero(),
            missing,
        })
    }

    /// 先进先出扣减
    ///
    /// # 顺序
    /// - acquired_at 升序，lot_id 升序兜底；已耗尽批次直接跳过
    ///
    /// # 语义
    /// - quantity = 0: 无操作，返回空列表
    /// - 落笔前独立复核充足性；不足 → InsufficientInventory，零落库
    /// - 每笔取用 min(批次剩余, 尚需)，成本即时舍入
    ///
    /// # 事务性
    /// 本函数逐批次 UPDATE，原子性由调用方持有的事务句柄保证
    pub fn consume_fifo(
        &self,
        conn: &Connection,
        material_id: &str,
        quantity: Decimal,
    ) -> EngineResult<Vec<LotDraw>> {
        if quantity < Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "扣减量不得为负: material_id={material_id}, quantity={quantity}"
            )));
        }
        if quantity.is_zero() {
            return Ok(Vec::new());
        }

        // 独立复核，不信任调用方的预检
        let report = self.check_availability(conn, material_id, quantity)?;
        if !report.sufficient {
            return Err(EngineError::InsufficientInventory {
                shortfalls: vec![Shortfall {
                    material_id: report.material_id,
                    material_name: report.material_name,
                    needed: report.needed,
                    available: report.available,
                    missing: report.missing,
                }],
            });
        }

        let now = Utc::now();
        let lots = LotRepository::list_by_material_fifo_on(conn, material_id)?;
        let mut still_needed = quantity;
        let mut draws = Vec::new();

        for lot in &lots {
            if still_needed.is_zero() {
                break;
            }
            if lot.is_depleted() {
                continue;
            }

            let taken = still_needed.min(lot.remaining_quantity);
            let new_remaining = lot.remaining_quantity - taken;
            LotRepository::apply_depletion_on(conn, &lot.lot_id, new_remaining, now)?;

            let cost = round_cost(taken * lot.unit_cost, self.cost_scale);
            debug!(
                material_id = %material_id,
                lot_id = %lot.lot_id,
                taken = %taken,
                remaining = %new_remaining,
                cost = %cost,
                "批次扣减"
            );

            draws.push(LotDraw {
                lot_id: lot.lot_id.clone(),
                quantity_taken: taken,
                unit_cost: lot.unit_cost,
                cost,
            });
            still_needed -= taken;
        }

        // 复核通过后尚需必然归零；未归零说明批次在本事务内被并改，立即暴露
        if !still_needed.is_zero() {
            return Err(EngineError::Internal(format!(
                "FIFO 扣减未满足需求: material_id={material_id}, still_needed={still_needed}"
            )));
        }

        info!(
            material_id = %material_id,
            quantity = %quantity,
            lots_touched = draws.len(),
            "FIFO 扣减完成"
        );

        Ok(draws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{lot_remaining, seed_lot, seed_material, setup_conn};
    use rust_decimal_macros::dec;

    #[test]
    fn test_check_availability_sums_all_lots() {
        let conn = setup_conn();
        seed_material(&conn, "flour", "面粉", "杯");
        seed_lot(&conn, "l1", "flour", dec!(5), dec!(0.40), "2025-01-01T00:00:00Z");
        seed_lot(&conn, "l2", "flour", dec!(5), dec!(0.60), "2025-01-15T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        let report = ledger.check_availability(&conn, "flour", dec!(6)).unwrap();
        assert!(report.sufficient);
        assert_eq!(report.available, dec!(10));
        assert_eq!(report.missing, dec!(0));
    }

    // 场景: 4 杯库存请求 6 杯 → missing=2，批次原样
    #[test]
    fn test_insufficient_reports_missing_and_mutates_nothing() {
        let conn = setup_conn();
        seed_material(&conn, "flour", "面粉", "杯");
        seed_lot(&conn, "l1", "flour", dec!(4), dec!(0.50), "2025-01-01T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        let report = ledger.check_availability(&conn, "flour", dec!(6)).unwrap();
        assert!(!report.sufficient);
        assert_eq!(report.missing, dec!(2));

        let err = ledger.consume_fifo(&conn, "flour", dec!(6)).unwrap_err();
        match err {
            EngineError::InsufficientInventory { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].missing, dec!(2));
            }
            other => panic!("意外错误: {other}"),
        }
        assert_eq!(lot_remaining(&conn, "l1"), dec!(4));
    }

    // 场景: 两批面粉，消耗 7 杯 → Lot1 全取 5（$2.00）+ Lot2 取 2（$1.20）
    #[test]
    fn test_consume_fifo_spans_lots_oldest_first() {
        let conn = setup_conn();
        seed_material(&conn, "flour", "面粉", "杯");
        seed_lot(&conn, "l2", "flour", dec!(5), dec!(0.60), "2025-01-15T00:00:00Z");
        seed_lot(&conn, "l1", "flour", dec!(5), dec!(0.40), "2025-01-01T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        let draws = ledger.consume_fifo(&conn, "flour", dec!(7)).unwrap();

        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].lot_id, "l1");
        assert_eq!(draws[0].quantity_taken, dec!(5));
        assert_eq!(draws[0].cost, dec!(2.0000));
        assert_eq!(draws[1].lot_id, "l2");
        assert_eq!(draws[1].quantity_taken, dec!(2));
        assert_eq!(draws[1].cost, dec!(1.2000));

        assert_eq!(lot_remaining(&conn, "l1"), dec!(0));
        assert_eq!(lot_remaining(&conn, "l2"), dec!(3));
    }

    #[test]
    fn test_consume_fifo_ties_broken_by_lot_id() {
        let conn = setup_conn();
        seed_material(&conn, "salt", "盐", "g");
        // 同刻入库，lot_id 升序兜底
        seed_lot(&conn, "b", "salt", dec!(1), dec!(1), "2025-02-01T00:00:00Z");
        seed_lot(&conn, "a", "salt", dec!(1), dec!(2), "2025-02-01T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        let draws = ledger.consume_fifo(&conn, "salt", dec!(1)).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].lot_id, "a");
    }

    #[test]
    fn test_consume_fifo_zero_quantity_is_noop() {
        let conn = setup_conn();
        seed_material(&conn, "salt", "盐", "g");
        seed_lot(&conn, "l1", "salt", dec!(3), dec!(1), "2025-02-01T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        let draws = ledger.consume_fifo(&conn, "salt", dec!(0)).unwrap();
        assert!(draws.is_empty());
        assert_eq!(lot_remaining(&conn, "l1"), dec!(3));
    }

    #[test]
    fn test_consume_fifo_skips_depleted_lots() {
        let conn = setup_conn();
        seed_material(&conn, "salt", "盐", "g");
        seed_lot(&conn, "old", "salt", dec!(0), dec!(1), "2025-01-01T00:00:00Z");
        seed_lot(&conn, "new", "salt", dec!(5), dec!(1), "2025-03-01T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        let draws = ledger.consume_fifo(&conn, "salt", dec!(2)).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].lot_id, "new");
    }

    // 耗尽到零后，任何正量请求都必须报不足
    #[test]
    fn test_exact_depletion_then_insufficient() {
        let conn = setup_conn();
        seed_material(&conn, "salt", "盐", "g");
        seed_lot(&conn, "l1", "salt", dec!(5), dec!(1), "2025-01-01T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        ledger.consume_fifo(&conn, "salt", dec!(5)).unwrap();

        let report = ledger.check_availability(&conn, "salt", dec!(0.001)).unwrap();
        assert!(!report.sufficient);
        assert_eq!(report.available, dec!(0));

        assert!(matches!(
            ledger.consume_fifo(&conn, "salt", dec!(0.001)).unwrap_err(),
            EngineError::InsufficientInventory { .. }
        ));
    }

    // 性质: 任一批次被取用总量不超过其原始入库量
    #[test]
    fn test_lot_never_overdrawn() {
        let conn = setup_conn();
        seed_material(&conn, "salt", "盐", "g");
        seed_lot(&conn, "l1", "salt", dec!(2.5), dec!(1), "2025-01-01T00:00:00Z");
        seed_lot(&conn, "l2", "salt", dec!(2.5), dec!(1), "2025-01-02T00:00:00Z");

        let ledger = InventoryLedger::new(4);
        let mut taken_l1 = Decimal::ZERO;
        for _ in 0..4 {
            if let Ok(draws) = ledger.consume_fifo(&conn, "salt", dec!(1.2)) {
                taken_l1 += draws
                    .iter()
                    .filter(|d| d.lot_id == "l1")
                    .map(|d| d.quantity_taken)
                    .sum::<Decimal>();
            }
        }
        assert!(taken_l1 <= dec!(2.5));
        assert!(lot_remaining(&conn, "l1") >= Decimal::ZERO);
    }

    #[test]
    fn test_unknown_material_is_not_found() {
        let conn = setup_conn();
        let ledger = InventoryLedger::new(4);
        assert!(matches!(
            ledger.check_availability(&conn, "nope", dec!(1)).unwrap_err(),
            EngineError::NotFound { .. }
        ));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let conn = setup_conn();
        seed_material(&conn, "salt", "盐", "g");
        let ledger = InventoryLedger::new(4);
        assert!(matches!(
            ledger.consume_fifo(&conn, "salt", dec!(-1)).unwrap_err(),
            EngineError::InvalidInput(_)
        ));
    }
}
