// ==========================================
// 小批量生产核算系统 - 库存批次仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: remaining_quantity 只减不增，归零不删（审计追溯）
// 说明: FIFO 扣减的事务性由调用方（编排器/台账引擎）持有的
//       事务句柄保证，本仓储提供 *_on(&Connection) 组合入口
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::material::Lot;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{datetime_from_text, decimal_from_text};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

// ==========================================
// LotRepository - 库存批次仓储
// ==========================================
/// 库存批次仓储
/// 职责: 管理 lot 表的读写（写入方为外部采购事件/测试夹具）
pub struct LotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LotRepository {
    /// 创建新的 LotRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 行 → Lot（列顺序与 SELECT_COLUMNS 对齐）
    fn map_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String, String, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn build_lot(
        raw: (String, String, String, String, String, String, String, String),
    ) -> RepositoryResult<Lot> {
        let (lot_id, material_id, initial, remaining, unit_cost, acquired_at, created_at, updated_at) =
            raw;
        Ok(Lot {
            lot_id,
            material_id,
            initial_quantity: decimal_from_text("lot.initial_quantity", &initial)?,
            remaining_quantity: decimal_from_text("lot.remaining_quantity", &remaining)?,
            unit_cost: decimal_from_text("lot.unit_cost", &unit_cost)?,
            acquired_at: datetime_from_text("lot.acquired_at", &acquired_at)?,
            created_at: datetime_from_text("lot.created_at", &created_at)?,
            updated_at: datetime_from_text("lot.updated_at", &updated_at)?,
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        lot_id, material_id, initial_quantity, remaining_quantity,
        unit_cost, acquired_at, created_at, updated_at
    "#;

    /// 插入库存批次
    pub fn insert(&self, lot: &Lot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_on(&conn, lot)
    }

    /// 在给定连接/事务上插入库存批次
    pub fn insert_on(conn: &Connection, lot: &Lot) -> RepositoryResult<()> {
        if lot.remaining_quantity < Decimal::ZERO {
            return Err(RepositoryError::ValidationError(format!(
                "批次剩余数量不得为负: lot_id={}, remaining={}",
                lot.lot_id, lot.remaining_quantity
            )));
        }
        conn.execute(
            r#"
            INSERT INTO lot (
                lot_id, material_id, initial_quantity, remaining_quantity,
                unit_cost, acquired_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                lot.lot_id,
                lot.material_id,
                lot.initial_quantity.to_string(),
                lot.remaining_quantity.to_string(),
                lot.unit_cost.to_string(),
                lot.acquired_at.to_rfc3339(),
                lot.created_at.to_rfc3339(),
                lot.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按 lot_id 查询批次
    pub fn find_by_id(&self, lot_id: &str) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        Self::find_by_id_on(&conn, lot_id)
    }

    /// 在给定连接/事务上按 lot_id 查询批次
    pub fn find_by_id_on(conn: &Connection, lot_id: &str) -> RepositoryResult<Option<Lot>> {
        let sql = format!(
            "SELECT {} FROM lot WHERE lot_id = ?1",
            Self::SELECT_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![lot_id], Self::map_row)
            .optional()?;
        raw.map(Self::build_lot).transpose()
    }

    /// 列出某物料的全部批次，FIFO 顺序
    ///
    /// # 排序
    /// - acquired_at 升序，lot_id 升序兜底（同刻入库时保证确定性）
    /// - 包含已耗尽批次（调用方自行跳过，审计场景需要全量）
    pub fn list_by_material_fifo(&self, material_id: &str) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        Self::list_by_material_fifo_on(&conn, material_id)
    }

    /// 在给定连接/事务上列出某物料的全部批次，FIFO 顺序
    pub fn list_by_material_fifo_on(
        conn: &Connection,
        material_id: &str,
    ) -> RepositoryResult<Vec<Lot>> {
        let sql = format!(
            "SELECT {} FROM lot WHERE material_id = ?1 ORDER BY acquired_at ASC, lot_id ASC",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![material_id], Self::map_row)?;

        let mut lots = Vec::new();
        for row in rows {
            lots.push(Self::build_lot(row?)?);
        }
        Ok(lots)
    }

    /// 在给定连接/事务上应用一次批次扣减
    ///
    /// # 约束
    /// - new_remaining 必须非负且不大于当前 remaining_quantity（只减不增）
    /// - 违反约束返回 ValidationError，不落库
    pub fn apply_depletion_on(
        conn: &Connection,
        lot_id: &str,
        new_remaining: Decimal,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        if new_remaining < Decimal::ZERO {
            return Err(RepositoryError::ValidationError(format!(
                "扣减后剩余数量不得为负: lot_id={lot_id}, new_remaining={new_remaining}"
            )));
        }

        let current = Self::find_by_id_on(conn, lot_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Lot".to_string(),
            id: lot_id.to_string(),
        })?;

        if new_remaining > current.remaining_quantity {
            return Err(RepositoryError::ValidationError(format!(
                "批次数量只减不增: lot_id={lot_id}, current={}, new={new_remaining}",
                current.remaining_quantity
            )));
        }

        conn.execute(
            "UPDATE lot SET remaining_quantity = ?1, updated_at = ?2 WHERE lot_id = ?3",
            params![new_remaining.to_string(), now.to_rfc3339(), lot_id],
        )?;
        Ok(())
    }
}
