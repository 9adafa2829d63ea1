// ==========================================
// 小批量生产核算系统 - 生产记录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: production_run 与 consumption_record 必须在调用方的
//       同一事务内写入，不允许孤儿消耗记录
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::production::{ConsumptionRecord, ProductionRun};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{datetime_from_text, decimal_from_text};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ProductionRunRepository - 生产记录仓储
// ==========================================
/// 生产记录仓储
/// 职责: 管理 production_run / consumption_record 表（追加写，历史不可变）
pub struct ProductionRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRunRepository {
    /// 创建新的 ProductionRunRepository 实例
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

    /// 在给定连接/事务上写入生产记录及其全部消耗记录
    ///
    /// # 约束
    /// - 只能在编排器持有的事务内调用；本函数不自行开启事务
    /// - 消耗记录的 run_id 必须与 run 一致
    pub fn insert_with_consumptions_on(
        conn: &Connection,
        run: &ProductionRun,
        consumptions: &[ConsumptionRecord],
    ) -> RepositoryResult<()> {
        if let Some(stray) = consumptions.iter().find(|c| c.run_id != run.run_id) {
            return Err(RepositoryError::ValidationError(format!(
                "消耗记录归属不一致: record_id={}, run_id={}, expected={}",
                stray.record_id, stray.run_id, run.run_id
            )));
        }

        conn.execute(
            r#"
            INSERT INTO production_run (
                run_id, recipe_id, batches, expected_yield, actual_yield,
                total_cost, unit_cost, notes, produced_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                run.run_id,
                run.recipe_id,
                run.batches,
                run.expected_yield.to_string(),
                run.actual_yield.to_string(),
                run.total_cost.to_string(),
                run.unit_cost.to_string(),
                run.notes,
                run.produced_at.to_rfc3339(),
                run.created_at.to_rfc3339(),
            ],
        )?;

        for record in consumptions {
            conn.execute(
                r#"
                INSERT INTO consumption_record (
                    record_id, run_id, material_id, quantity, total_cost, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    record.record_id,
                    record.run_id,
                    record.material_id,
                    record.quantity.to_string(),
                    record.total_cost.to_string(),
                    record.created_at.to_rfc3339(),
                ],
            )?;
        }

        Ok(())
    }

    /// 行 → ProductionRun
    fn build_run(row: &Row<'_>) -> rusqlite::Result<RawRun> {
        Ok(RawRun {
            run_id: row.get(0)?,
            recipe_id: row.get(1)?,
            batches: row.get(2)?,
            expected_yield: row.get(3)?,
            actual_yield: row.get(4)?,
            total_cost: row.get(5)?,
            unit_cost: row.get(6)?,
            notes: row.get(7)?,
            produced_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    const RUN_COLUMNS: &'static str = r#"
        run_id, recipe_id, batches, expected_yield, actual_yield,
        total_cost, unit_cost, notes, produced_at, created_at
    "#;

    /// 按 run_id 查询生产记录
    pub fn find_by_id(&self, run_id: &str) -> RepositoryResult<Option<ProductionRun>> {
        let conn = self.get_conn()?;
        Self::find_by_id_on(&conn, run_id)
    }

    /// 在给定连接/事务上按 run_id 查询生产记录
    pub fn find_by_id_on(conn: &Connection, run_id: &str) -> RepositoryResult<Option<ProductionRun>> {
        let sql = format!(
            "SELECT {} FROM production_run WHERE run_id = ?1",
            Self::RUN_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![run_id], Self::build_run)
            .optional()?;
        raw.map(RawRun::into_run).transpose()
    }

    /// 列出全部生产记录（生产时间倒序）
    pub fn list_all(&self) -> RepositoryResult<Vec<ProductionRun>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM production_run ORDER BY produced_at DESC, run_id",
            Self::RUN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::build_run)?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?.into_run()?);
        }
        Ok(runs)
    }

    /// 列出某生产记录的全部消耗记录（material_id 排序）
    pub fn list_consumptions(&self, run_id: &str) -> RepositoryResult<Vec<ConsumptionRecord>> {
        let conn = self.get_conn()?;
        Self::list_consumptions_on(&conn, run_id)
    }

    /// 在给定连接/事务上列出某生产记录的全部消耗记录
    pub fn list_consumptions_on(
        conn: &Connection,
        run_id: &str,
    ) -> RepositoryResult<Vec<ConsumptionRecord>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT record_id, run_id, material_id, quantity, total_cost, created_at
            FROM consumption_record
            WHERE run_id = ?1
            ORDER BY material_id
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (record_id, run_id, material_id, quantity, total_cost, created_at) = row?;
            records.push(ConsumptionRecord {
                record_id,
                run_id,
                material_id,
                quantity: decimal_from_text("consumption_record.quantity", &quantity)?,
                total_cost: decimal_from_text("consumption_record.total_cost", &total_cost)?,
                created_at: datetime_from_text("consumption_record.created_at", &created_at)?,
            });
        }
        Ok(records)
    }
}

// 中间行结构（TEXT 列延迟解析）
struct RawRun {
    run_id: String,
    recipe_id: String,
    batches: u32,
    expected_yield: String,
    actual_yield: String,
    total_cost: String,
    unit_cost: String,
    notes: Option<String>,
    produced_at: String,
    created_at: String,
}

impl RawRun {
    fn into_run(self) -> RepositoryResult<ProductionRun> {
        Ok(ProductionRun {
            run_id: self.run_id,
            recipe_id: self.recipe_id,
            batches: self.batches,
            expected_yield: decimal_from_text("production_run.expected_yield", &self.expected_yield)?,
            actual_yield: decimal_from_text("production_run.actual_yield", &self.actual_yield)?,
            total_cost: decimal_from_text("production_run.total_cost", &self.total_cost)?,
            unit_cost: decimal_from_text("production_run.unit_cost", &self.unit_cost)?,
            notes: self.notes,
            produced_at: datetime_from_text("production_run.produced_at", &self.produced_at)?,
            created_at: datetime_from_text("production_run.created_at", &self.created_at)?,
        })
    }
}
