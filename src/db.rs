// ==========================================
// 小批量生产核算系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少偶发 busy 错误
// - 提供幂等建表入口 init_schema（核心只消费 schema，不做自动迁移）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等初始化数据库 schema
///
/// # 约定
/// - 所有数量/金额列为 TEXT，存 Decimal 规范化字符串（禁止二进制浮点落库）
/// - 所有时间列为 TEXT，存 RFC3339
/// - lot 行只减不删：remaining_quantity 归零后保留（审计追溯）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- 物料主数据（外部目录子系统维护，本核心只读）
        CREATE TABLE IF NOT EXISTS material (
            material_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            unit TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- 库存批次（外部采购事件写入，本核心只读与扣减）
        CREATE TABLE IF NOT EXISTS lot (
            lot_id TEXT PRIMARY KEY,
            material_id TEXT NOT NULL REFERENCES material(material_id),
            initial_quantity TEXT NOT NULL,
            remaining_quantity TEXT NOT NULL,
            unit_cost TEXT NOT NULL,
            acquired_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_lot_material_fifo
            ON lot(material_id, acquired_at, lot_id);

        -- 配方主数据（外部目录子系统维护，本核心只读）
        CREATE TABLE IF NOT EXISTS recipe (
            recipe_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            yield_quantity TEXT NOT NULL,
            yield_unit TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- 配方直接物料需求
        CREATE TABLE IF NOT EXISTS recipe_ingredient (
            recipe_id TEXT NOT NULL REFERENCES recipe(recipe_id) ON DELETE CASCADE,
            material_id TEXT NOT NULL REFERENCES material(material_id),
            quantity_per_batch TEXT NOT NULL,
            PRIMARY KEY (recipe_id, material_id)
        );

        -- 配方子配方引用
        -- 写入时不做环校验，component_recipe_id 不设外键：
        -- 环与失效引用都可能在后续编辑中才形成，由 resolver 遍历时强制
        CREATE TABLE IF NOT EXISTS recipe_component (
            recipe_id TEXT NOT NULL REFERENCES recipe(recipe_id) ON DELETE CASCADE,
            component_recipe_id TEXT NOT NULL,
            multiplier TEXT NOT NULL,
            PRIMARY KEY (recipe_id, component_recipe_id)
        );

        -- 生产记录（只由生产事务编排器在事务终点写入）
        CREATE TABLE IF NOT EXISTS production_run (
            run_id TEXT PRIMARY KEY,
            recipe_id TEXT NOT NULL REFERENCES recipe(recipe_id),
            batches INTEGER NOT NULL,
            expected_yield TEXT NOT NULL,
            actual_yield TEXT NOT NULL,
            total_cost TEXT NOT NULL,
            unit_cost TEXT NOT NULL,
            notes TEXT,
            produced_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- 消耗记录（与所属 production_run 同事务写入，落库后不可变）
        CREATE TABLE IF NOT EXISTS consumption_record (
            record_id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES production_run(run_id) ON DELETE CASCADE,
            material_id TEXT NOT NULL REFERENCES material(material_id),
            quantity TEXT NOT NULL,
            total_cost TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_consumption_run
            ON consumption_record(run_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
