// ==========================================
// 小批量生产核算系统 - 配方仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 写入时不校验子配方环——环可能在后续编辑中才形成，
//       由 resolver 在遍历时强制（见 engine/resolver.rs）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::recipe::{Recipe, RecipeComponent, RecipeIngredient};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{datetime_from_text, decimal_from_text};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// RecipeRepository - 配方仓储
// ==========================================
/// 配方仓储
/// 职责: 管理 recipe / recipe_ingredient / recipe_component 三表的聚合读写
pub struct RecipeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RecipeRepository {
    /// 创建新的 RecipeRepository 实例
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

    /// 保存配方聚合（upsert 语义，子表整体重写）
    ///
    /// # 说明
    /// - 父行 + 子表在同一事务内写入
    pub fn save(&self, recipe: &Recipe) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Self::save_on(&tx, recipe)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 在给定连接/事务上保存配方聚合
    pub fn save_on(conn: &Connection, recipe: &Recipe) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO recipe (
                recipe_id, name, yield_quantity, yield_unit, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                recipe.recipe_id,
                recipe.name,
                recipe.yield_quantity.to_string(),
                recipe.yield_unit,
                recipe.created_at.to_rfc3339(),
                recipe.updated_at.to_rfc3339(),
            ],
        )?;

        // 子表整体重写
        conn.execute(
            "DELETE FROM recipe_ingredient WHERE recipe_id = ?1",
            params![recipe.recipe_id],
        )?;
        conn.execute(
            "DELETE FROM recipe_component WHERE recipe_id = ?1",
            params![recipe.recipe_id],
        )?;

        for ingredient in &recipe.ingredients {
            conn.execute(
                r#"
                INSERT INTO recipe_ingredient (recipe_id, material_id, quantity_per_batch)
                VALUES (?1, ?2, ?3)
                "#,
                params![
                    recipe.recipe_id,
                    ingredient.material_id,
                    ingredient.quantity_per_batch.to_string(),
                ],
            )?;
        }

        for component in &recipe.components {
            conn.execute(
                r#"
                INSERT INTO recipe_component (recipe_id, component_recipe_id, multiplier)
                VALUES (?1, ?2, ?3)
                "#,
                params![
                    recipe.recipe_id,
                    component.component_recipe_id,
                    component.multiplier.to_string(),
                ],
            )?;
        }

        Ok(())
    }

    /// 按 recipe_id 查询配方聚合
    pub fn find_by_id(&self, recipe_id: &str) -> RepositoryResult<Option<Recipe>> {
        let conn = self.get_conn()?;
        Self::find_by_id_on(&conn, recipe_id)
    }

    /// 在给定连接/事务上按 recipe_id 查询配方聚合
    pub fn find_by_id_on(conn: &Connection, recipe_id: &str) -> RepositoryResult<Option<Recipe>> {
        let header = conn
            .query_row(
                r#"
                SELECT recipe_id, name, yield_quantity, yield_unit, created_at, updated_at
                FROM recipe
                WHERE recipe_id = ?1
                "#,
                params![recipe_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((recipe_id, name, yield_quantity, yield_unit, created_at, updated_at)) = header
        else {
            return Ok(None);
        };

        // 直接物料需求（material_id 排序，输出确定）
        let mut stmt = conn.prepare(
            r#"
            SELECT material_id, quantity_per_batch
            FROM recipe_ingredient
            WHERE recipe_id = ?1
            ORDER BY material_id
            "#,
        )?;
        let ingredient_rows = stmt.query_map(params![recipe_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut ingredients = Vec::new();
        for row in ingredient_rows {
            let (material_id, quantity) = row?;
            ingredients.push(RecipeIngredient {
                material_id,
                quantity_per_batch: decimal_from_text(
                    "recipe_ingredient.quantity_per_batch",
                    &quantity,
                )?,
            });
        }

        // 子配方引用
        let mut stmt = conn.prepare(
            r#"
            SELECT component_recipe_id, multiplier
            FROM recipe_component
            WHERE recipe_id = ?1
            ORDER BY component_recipe_id
            "#,
        )?;
        let component_rows = stmt.query_map(params![recipe_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut components = Vec::new();
        for row in component_rows {
            let (component_recipe_id, multiplier) = row?;
            components.push(RecipeComponent {
                component_recipe_id,
                multiplier: decimal_from_text("recipe_component.multiplier", &multiplier)?,
            });
        }

        Ok(Some(Recipe {
            recipe_id,
            name,
            yield_quantity: decimal_from_text("recipe.yield_quantity", &yield_quantity)?,
            yield_unit,
            ingredients,
            components,
            created_at: datetime_from_text("recipe.created_at", &created_at)?,
            updated_at: datetime_from_text("recipe.updated_at", &updated_at)?,
        }))
    }

    /// 列出全部配方 id 与名称（按名称排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<(String, String)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT recipe_id, name FROM recipe ORDER BY name, recipe_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut recipes = Vec::new();
        for row in rows {
            recipes.push(row?);
        }
        Ok(recipes)
    }
}
