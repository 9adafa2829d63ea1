// ==========================================
// 小批量生产核算系统 - 库存业务接口
// ==========================================
// 职责: 面向外部展示层的只读库存查询入口
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{require_id, require_non_negative};
use crate::config::CoreConfig;
use crate::domain::material::{Lot, Material};
use crate::engine::ledger::{AvailabilityReport, InventoryLedger};
use crate::repository::error::RepositoryError;
use crate::repository::lot_repo::LotRepository;
use crate::repository::material_repo::MaterialRepository;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// MaterialStock - 物料库存视图
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialStock {
    pub material: Material,
    pub lots: Vec<Lot>,           // FIFO 顺序，含已耗尽批次（审计）
    pub total_remaining: Decimal, // 剩余量合计
}

// ==========================================
// InventoryApi - 库存业务接口
// ==========================================
pub struct InventoryApi {
    conn: Arc<Mutex<Connection>>,
    ledger: InventoryLedger,
}

impl InventoryApi {
    /// 创建新的 InventoryApi 实例
    pub fn new(conn: Arc<Mutex<Connection>>, config: &CoreConfig) -> Self {
        Self {
            ledger: InventoryLedger::new(config.cost_scale),
            conn,
        }
    }

    fn lock(&self) -> ApiResult<std::sync::MutexGuard<'_, Connection>> {
        Ok(self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?)
    }

    /// 查询物料可用量（纯读）
    pub fn check_availability(
        &self,
        material_id: &str,
        quantity_needed: Decimal,
    ) -> ApiResult<AvailabilityReport> {
        require_id("material_id", material_id)?;
        require_non_negative("quantity_needed", quantity_needed)?;

        let conn = self.lock()?;
        Ok(self
            .ledger
            .check_availability(&conn, material_id, quantity_needed)?)
    }

    /// 查询物料库存视图（批次级，含已耗尽批次）
    pub fn material_stock(&self, material_id: &str) -> ApiResult<MaterialStock> {
        require_id("material_id", material_id)?;

        let conn = self.lock()?;
        let material =
            MaterialRepository::find_by_id_on(&conn, material_id)?.ok_or_else(|| {
                ApiError::NotFound {
                    entity: "Material".to_string(),
                    id: material_id.to_string(),
                }
            })?;
        let lots = LotRepository::list_by_material_fifo_on(&conn, material_id)?;
        let total_remaining = lots.iter().map(|lot| lot.remaining_quantity).sum();

        Ok(MaterialStock {
            material,
            lots,
            total_remaining,
        })
    }
}
