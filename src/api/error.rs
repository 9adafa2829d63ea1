// ==========================================
// 小批量生产核算系统 - API层错误类型
// ==========================================
// 职责: 把引擎/仓储错误转换为调用方（外部展示层）可直接消费的
//       结构化错误；所有错误信息必须包含显式原因（可解释性）
// ==========================================

use crate::domain::production::Shortfall;
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    /// 配方图循环引用（展示层应提示用户修正配方编辑）
    #[error("配方循环引用: {path}")]
    CircularRecipe { path: String },

    /// 配方嵌套过深
    #[error("配方嵌套超过最大深度: max_depth={max_depth}")]
    RecipeTooDeep { max_depth: u32 },

    /// 库存不足：携带完整缺口清单供展示层一次性呈现
    #[error("库存不足: {} 种物料存在缺口", .shortfalls.len())]
    InsufficientInventory { shortfalls: Vec<Shortfall> },

    // ==========================================
    // 系统错误
    // ==========================================
    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::CircularReference { path } => ApiError::CircularRecipe { path },
            EngineError::DepthExceeded { max_depth, .. } => ApiError::RecipeTooDeep { max_depth },
            EngineError::InsufficientInventory { shortfalls } => {
                ApiError::InsufficientInventory { shortfalls }
            }
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            EngineError::Internal(msg) => ApiError::Internal(msg),
            EngineError::Repository(e) => e.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::Internal(format!("字段值错误 (field={field}): {message}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("序列化失败: {err}"))
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
