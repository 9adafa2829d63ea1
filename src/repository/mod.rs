// ==========================================
// 小批量生产核算系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: *_on(&Connection) 入口供编排器在单一事务内组合调用
// ==========================================

pub mod error;
pub mod lot_repo;
pub mod material_repo;
pub mod production_repo;
pub mod recipe_repo;

mod row;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use lot_repo::LotRepository;
pub use material_repo::MaterialRepository;
pub use production_repo::ProductionRunRepository;
pub use recipe_repo::RecipeRepository;
