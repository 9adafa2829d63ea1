// ==========================================
// 小批量生产核算系统 - 物料主数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::material::Material;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::datetime_from_text;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// MaterialRepository - 物料主数据仓储
// ==========================================
/// 物料主数据仓储
/// 职责: 管理 material 表的读写（写入方为外部目录子系统/测试夹具）
pub struct MaterialRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialRepository {
    /// 创建新的 MaterialRepository 实例
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

    /// 插入物料主数据（INSERT OR REPLACE 实现 upsert 语义）
    pub fn insert(&self, material: &Material) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_on(&conn, material)
    }

    /// 在给定连接/事务上插入物料主数据
    pub fn insert_on(conn: &Connection, material: &Material) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO material (material_id, name, unit, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                material.material_id,
                material.name,
                material.unit,
                material.created_at.to_rfc3339(),
                material.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按 material_id 查询物料
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<Material>> {
        let conn = self.get_conn()?;
        Self::find_by_id_on(&conn, material_id)
    }

    /// 在给定连接/事务上按 material_id 查询物料
    pub fn find_by_id_on(conn: &Connection, material_id: &str) -> RepositoryResult<Option<Material>> {
        let row = conn
            .query_row(
                r#"
                SELECT material_id, name, unit, created_at, updated_at
                FROM material
                WHERE material_id = ?1
                "#,
                params![material_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(material_id, name, unit, created_at, updated_at)| {
            Ok(Material {
                material_id,
                name,
                unit,
                created_at: datetime_from_text("material.created_at", &created_at)?,
                updated_at: datetime_from_text("material.updated_at", &updated_at)?,
            })
        })
        .transpose()
    }

    /// 列出全部物料（按名称排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Material>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT material_id, name, unit, created_at, updated_at
            FROM material
            ORDER BY name, material_id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut materials = Vec::new();
        for row in rows {
            let (material_id, name, unit, created_at, updated_at) = row?;
            materials.push(Material {
                material_id,
                name,
                unit,
                created_at: datetime_from_text("material.created_at", &created_at)?,
                updated_at: datetime_from_text("material.updated_at", &updated_at)?,
            });
        }
        Ok(materials)
    }
}
