// ==========================================
// 小批量生产核算系统 - API 层
// ==========================================
// 职责: 面向外部展示层的业务接口
// 红线: 只返回结构化结果/结构化错误；格式化、确认提示、重试
//       一律归外部调用方
// ==========================================

pub mod error;
pub mod inventory_api;
pub mod production_api;
pub mod validator;

// 重导出核心接口
pub use error::{ApiError, ApiResult};
pub use inventory_api::{InventoryApi, MaterialStock};
pub use production_api::{ProductionApi, ProductionRunDetail};
