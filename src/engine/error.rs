// ==========================================
// 小批量生产核算系统 - 引擎层错误类型
// ==========================================
// 红线: 所有错误必须包含显式原因（可解释性）
// 红线: 引擎层不自动重试，重试策略归外部调用方
// ==========================================

use crate::domain::production::Shortfall;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 配方图错误 =====
    /// 配方在自己的祖先路径上再次出现（遍历时强制，写入时不校验）
    #[error("配方循环引用: path={path}")]
    CircularReference { path: String },

    /// 嵌套深度超过配置上限
    #[error("配方嵌套超过最大深度: max_depth={max_depth}, recipe_id={recipe_id}")]
    DepthExceeded { max_depth: u32, recipe_id: String },

    // ===== 库存错误 =====
    /// 预检短缺：携带完整缺口清单，一次暴露全部采购缺口；零落库
    #[error("库存不足: {} 种物料存在缺口", .shortfalls.len())]
    InsufficientInventory { shortfalls: Vec<Shortfall> },

    // ===== 输入错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 通用错误 =====
    /// 消耗过程中的意外失败（触发整体回滚，与库存不足语义不同）
    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
