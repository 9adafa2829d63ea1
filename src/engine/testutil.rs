// ==========================================
// 引擎层测试辅助
// ==========================================
// 职责: 内存数据库初始化与测试数据生成（仅 cfg(test) 编译）
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema};
use crate::domain::material::{Lot, Material};
use crate::domain::recipe::{Recipe, RecipeComponent, RecipeIngredient};
use crate::repository::lot_repo::LotRepository;
use crate::repository::material_repo::MaterialRepository;
use crate::repository::recipe_repo::RecipeRepository;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

/// 创建内存测试数据库（统一 PRAGMA + 建表）
pub(crate) fn setup_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("打开内存数据库失败");
    configure_sqlite_connection(&conn).expect("配置 PRAGMA 失败");
    init_schema(&conn).expect("初始化 schema 失败");
    conn
}

/// 创建共享内存测试数据库（编排器需要 Arc<Mutex<Connection>>）
pub(crate) fn setup_shared_conn() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(setup_conn()))
}

/// 插入测试物料
pub(crate) fn seed_material(conn: &Connection, material_id: &str, name: &str, unit: &str) {
    let now = Utc::now();
    MaterialRepository::insert_on(
        conn,
        &Material {
            material_id: material_id.to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            created_at: now,
            updated_at: now,
        },
    )
    .expect("插入测试物料失败");
}

/// 插入测试批次（initial = remaining）
pub(crate) fn seed_lot(
    conn: &Connection,
    lot_id: &str,
    material_id: &str,
    quantity: Decimal,
    unit_cost: Decimal,
    acquired_at: &str,
) {
    let now = Utc::now();
    let acquired_at = DateTime::parse_from_rfc3339(acquired_at)
        .expect("非法测试时间")
        .with_timezone(&Utc);
    LotRepository::insert_on(
        conn,
        &Lot {
            lot_id: lot_id.to_string(),
            material_id: material_id.to_string(),
            initial_quantity: quantity,
            remaining_quantity: quantity,
            unit_cost,
            acquired_at,
            created_at: now,
            updated_at: now,
        },
    )
    .expect("插入测试批次失败");
}

/// 插入测试配方
pub(crate) fn seed_recipe(
    conn: &Connection,
    recipe_id: &str,
    name: &str,
    yield_quantity: Decimal,
    ingredients: &[(&str, Decimal)],
    components: &[(&str, Decimal)],
) {
    let now = Utc::now();
    RecipeRepository::save_on(
        conn,
        &Recipe {
            recipe_id: recipe_id.to_string(),
            name: name.to_string(),
            yield_quantity,
            yield_unit: Some("个".to_string()),
            ingredients: ingredients
                .iter()
                .map(|(material_id, quantity)| RecipeIngredient {
                    material_id: material_id.to_string(),
                    quantity_per_batch: *quantity,
                })
                .collect(),
            components: components
                .iter()
                .map(|(component_id, multiplier)| RecipeComponent {
                    component_recipe_id: component_id.to_string(),
                    multiplier: *multiplier,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        },
    )
    .expect("插入测试配方失败");
}

/// 读取批次剩余量
pub(crate) fn lot_remaining(conn: &Connection, lot_id: &str) -> Decimal {
    LotRepository::find_by_id_on(conn, lot_id)
        .expect("查询批次失败")
        .expect("批次不存在")
        .remaining_quantity
}

/// 统计表行数
pub(crate) fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .expect("统计行数失败")
}
