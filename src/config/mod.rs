// ==========================================
// 小批量生产核算系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表 (key-value)
// 红线: 无模块级全局可变状态——配置读出后以 CoreConfig 显式注入引擎
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::COST_SCALE;
use crate::engine::resolver::DEFAULT_MAX_RECIPE_DEPTH;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// 配置键全集
// ==========================================
pub mod config_keys {
    /// 配方嵌套深度上限
    pub const RECIPE_MAX_DEPTH: &str = "recipe.max_depth";
    /// 金额小数位数
    pub const COST_SCALE: &str = "cost.scale";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 读取配置值
    pub fn get_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（upsert 语义）
    pub fn set_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取 u32 配置值（非法值按缺失处理并告警）
    pub fn get_u32(&self, key: &str) -> RepositoryResult<Option<u32>> {
        match self.get_value(key)? {
            Some(raw) => match raw.parse::<u32>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => {
                    warn!(key = %key, raw = %raw, "配置值非法，按缺失处理");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}

// ==========================================
// CoreConfig - 核心配置快照
// ==========================================
/// 核心配置快照，构造后显式注入引擎
#[derive(Debug, Clone, Copy)]
pub struct CoreConfig {
    pub max_recipe_depth: u32, // 配方嵌套深度上限（根 = 第 0 层）
    pub cost_scale: u32,       // 金额小数位数
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_recipe_depth: DEFAULT_MAX_RECIPE_DEPTH,
            cost_scale: COST_SCALE,
        }
    }
}

impl CoreConfig {
    /// 从 config_kv 加载，缺失项取默认值
    pub fn load(manager: &ConfigManager) -> RepositoryResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_recipe_depth: manager
                .get_u32(config_keys::RECIPE_MAX_DEPTH)?
                .unwrap_or(defaults.max_recipe_depth),
            cost_scale: manager
                .get_u32(config_keys::COST_SCALE)?
                .unwrap_or(defaults.cost_scale),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::setup_shared_conn;

    #[test]
    fn test_core_config_defaults_when_table_empty() {
        let conn = setup_shared_conn();
        let manager = ConfigManager::from_connection(conn);
        let config = CoreConfig::load(&manager).unwrap();
        assert_eq!(config.max_recipe_depth, DEFAULT_MAX_RECIPE_DEPTH);
        assert_eq!(config.cost_scale, COST_SCALE);
    }

    #[test]
    fn test_core_config_overrides_from_kv() {
        let conn = setup_shared_conn();
        let manager = ConfigManager::from_connection(conn);
        manager.set_value(config_keys::RECIPE_MAX_DEPTH, "5").unwrap();
        manager.set_value(config_keys::COST_SCALE, "2").unwrap();

        let config = CoreConfig::load(&manager).unwrap();
        assert_eq!(config.max_recipe_depth, 5);
        assert_eq!(config.cost_scale, 2);
    }

    #[test]
    fn test_invalid_value_falls_back_to_default() {
        let conn = setup_shared_conn();
        let manager = ConfigManager::from_connection(conn);
        manager.set_value(config_keys::COST_SCALE, "两位").unwrap();

        let config = CoreConfig::load(&manager).unwrap();
        assert_eq!(config.cost_scale, COST_SCALE);
    }
}
