// ==========================================
// 小批量生产核算系统 - 配方图解析器
// ==========================================
// 用途: 把（可嵌套的）配方展开为扁平的 物料→总需求量 映射
// 红线: 纯只读，绝不触碰库存台账
// 红线: 环检测用"活动祖先路径"而非全局 visited——同一子配方
//       允许出现在互不相关的分支里
// 红线: 累加全程 Decimal，禁止二进制浮点
// ==========================================

use crate::domain::production::AggregatedRequirement;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::recipe_repo::RecipeRepository;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// 配方嵌套深度默认上限（根=0 层）
pub const DEFAULT_MAX_RECIPE_DEPTH: u32 = 3;

// ==========================================
// RecipeResolver - 配方图解析器
// ==========================================
pub struct RecipeResolver {
    max_depth: u32,
}

// 广度优先队列节点：携带各自的累计倍数与祖先路径
struct Node {
    recipe_id: String,
    multiplier: Decimal,
    depth: u32,
    path: Vec<String>,
}

impl RecipeResolver {
    /// 创建新的解析器实例
    ///
    /// # 参数
    /// - max_depth: 嵌套深度上限（根配方为第 0 层）
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// 展开配方为扁平物料需求映射
    ///
    /// # 参数
    /// - conn: 连接/事务句柄（由调用方决定事务边界）
    /// - recipe_id: 根配方
    /// - batch_multiplier: 批次倍数（必须 > 0）
    ///
    /// # 返回
    /// - AggregatedRequirement: material_id → 总需求量（空配方 → 空映射，合法）
    ///
    /// # 错误
    /// - CircularReference: 配方在自身祖先路径上再次出现
    /// - DepthExceeded: 嵌套超过 max_depth
    /// - NotFound: 根配方或子配方引用失效
    ///
    /// # 确定性
    /// 累加是纯加法，结果与兄弟节点遍历顺序无关
    pub fn aggregate(
        &self,
        conn: &Connection,
        recipe_id: &str,
        batch_multiplier: Decimal,
    ) -> EngineResult<AggregatedRequirement> {
        if batch_multiplier <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "batch_multiplier 必须大于 0: {batch_multiplier}"
            )));
        }

        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut queue: VecDeque<Node> = VecDeque::new();
        queue.push_back(Node {
            recipe_id: recipe_id.to_string(),
            multiplier: batch_multiplier,
            depth: 0,
            path: Vec::new(),
        });

        let mut visited_nodes = 0usize;

        while let Some(node) = queue.pop_front() {
            // 环检测先于任何展开工作
            if node.path.iter().any(|id| id == &node.recipe_id) {
                let mut cycle = node.path.clone();
                cycle.push(node.recipe_id.clone());
                return Err(EngineError::CircularReference {
                    path: cycle.join(" -> "),
                });
            }

            if node.depth > self.max_depth {
                return Err(EngineError::DepthExceeded {
                    max_depth: self.max_depth,
                    recipe_id: node.recipe_id,
                });
            }

            let recipe = RecipeRepository::find_by_id_on(conn, &node.recipe_id)?.ok_or_else(
                || EngineError::NotFound {
                    entity: "Recipe".to_string(),
                    id: node.recipe_id.clone(),
                },
            )?;

            visited_nodes += 1;
            debug!(
                recipe_id = %node.recipe_id,
                multiplier = %node.multiplier,
                depth = node.depth,
                ingredients = recipe.ingredients.len(),
                components = recipe.components.len(),
                "展开配方节点"
            );

            for ingredient in &recipe.ingredients {
                let amount = ingredient.quantity_per_batch * node.multiplier;
                *totals
                    .entry(ingredient.material_id.clone())
                    .or_insert(Decimal::ZERO) += amount;
            }

            for component in &recipe.components {
                let mut child_path = node.path.clone();
                child_path.push(node.recipe_id.clone());
                queue.push_back(Node {
                    recipe_id: component.component_recipe_id.clone(),
                    multiplier: node.multiplier * component.multiplier,
                    depth: node.depth + 1,
                    path: child_path,
                });
            }
        }

        info!(
            recipe_id = %recipe_id,
            batch_multiplier = %batch_multiplier,
            visited_nodes,
            materials = totals.len(),
            "配方展开完成"
        );

        Ok(AggregatedRequirement {
            recipe_id: recipe_id.to_string(),
            batch_multiplier,
            totals,
        })
    }
}

impl Default for RecipeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECIPE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{seed_material, seed_recipe, setup_conn};
    use rust_decimal_macros::dec;

    #[test]
    fn test_aggregate_flat_recipe() {
        let conn = setup_conn();
        seed_material(&conn, "flour", "面粉", "杯");
        seed_recipe(&conn, "cookie", "曲奇", dec!(30), &[("flour", dec!(2))], &[]);

        let resolver = RecipeResolver::default();
        let agg = resolver.aggregate(&conn, "cookie", dec!(3)).unwrap();
        assert_eq!(agg.totals.get("flour"), Some(&dec!(6)));
    }

    // 场景: 生日蛋糕 = 2×海绵层 + 1×糖霜；糖总量 = 2×1 + 1×0.5 = 2.5
    #[test]
    fn test_aggregate_nested_components() {
        let conn = setup_conn();
        seed_material(&conn, "sugar", "砂糖", "杯");
        seed_recipe(&conn, "sponge", "海绵层", dec!(1), &[("sugar", dec!(1))], &[]);
        seed_recipe(&conn, "frosting", "糖霜", dec!(1), &[("sugar", dec!(0.5))], &[]);
        seed_recipe(
            &conn,
            "cake",
            "生日蛋糕",
            dec!(1),
            &[],
            &[("sponge", dec!(2)), ("frosting", dec!(1))],
        );

        let resolver = RecipeResolver::default();
        let agg = resolver.aggregate(&conn, "cake", dec!(1)).unwrap();
        assert_eq!(agg.totals.get("sugar"), Some(&dec!(2.5)));
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let conn = setup_conn();
        seed_material(&conn, "sugar", "砂糖", "杯");
        seed_recipe(&conn, "a", "A", dec!(1), &[("sugar", dec!(1))], &[]);
        seed_recipe(&conn, "b", "B", dec!(1), &[("sugar", dec!(0.5))], &[]);
        // 两个根配方，兄弟顺序互换
        seed_recipe(&conn, "root1", "R1", dec!(1), &[], &[("a", dec!(2)), ("b", dec!(1))]);
        seed_recipe(&conn, "root2", "R2", dec!(1), &[], &[("b", dec!(1)), ("a", dec!(2))]);

        let resolver = RecipeResolver::default();
        let t1 = resolver.aggregate(&conn, "root1", dec!(1)).unwrap().totals;
        let t2 = resolver.aggregate(&conn, "root2", dec!(1)).unwrap().totals;
        assert_eq!(t1, t2);
    }

    // 场景: A 引用 B，B 被编辑为反向引用 A
    #[test]
    fn test_aggregate_detects_cycle() {
        let conn = setup_conn();
        seed_recipe(&conn, "a", "A", dec!(1), &[], &[("b", dec!(1))]);
        seed_recipe(&conn, "b", "B", dec!(1), &[], &[("a", dec!(1))]);

        let resolver = RecipeResolver::default();
        let err = resolver.aggregate(&conn, "a", dec!(1)).unwrap_err();
        assert!(matches!(err, EngineError::CircularReference { .. }));
        let err = resolver.aggregate(&conn, "b", dec!(1)).unwrap_err();
        assert!(matches!(err, EngineError::CircularReference { .. }));
    }

    #[test]
    fn test_aggregate_same_subrecipe_in_independent_branches_is_legal() {
        let conn = setup_conn();
        seed_material(&conn, "sugar", "砂糖", "杯");
        seed_recipe(&conn, "shared", "共用层", dec!(1), &[("sugar", dec!(1))], &[]);
        seed_recipe(&conn, "left", "左", dec!(1), &[], &[("shared", dec!(1))]);
        seed_recipe(&conn, "right", "右", dec!(1), &[], &[("shared", dec!(3))]);
        seed_recipe(
            &conn,
            "root",
            "根",
            dec!(1),
            &[],
            &[("left", dec!(1)), ("right", dec!(1))],
        );

        let resolver = RecipeResolver::default();
        let agg = resolver.aggregate(&conn, "root", dec!(1)).unwrap();
        assert_eq!(agg.totals.get("sugar"), Some(&dec!(4)));
    }

    #[test]
    fn test_aggregate_depth_exceeded() {
        let conn = setup_conn();
        // 链: d0 -> d1 -> d2 -> d3 -> d4，第 4 层超出默认上限 3
        seed_recipe(&conn, "d4", "层4", dec!(1), &[], &[]);
        seed_recipe(&conn, "d3", "层3", dec!(1), &[], &[("d4", dec!(1))]);
        seed_recipe(&conn, "d2", "层2", dec!(1), &[], &[("d3", dec!(1))]);
        seed_recipe(&conn, "d1", "层1", dec!(1), &[], &[("d2", dec!(1))]);
        seed_recipe(&conn, "d0", "层0", dec!(1), &[], &[("d1", dec!(1))]);

        let resolver = RecipeResolver::default();
        let err = resolver.aggregate(&conn, "d0", dec!(1)).unwrap_err();
        assert!(matches!(err, EngineError::DepthExceeded { max_depth: 3, .. }));

        // 上限放宽后同一张图合法
        let relaxed = RecipeResolver::new(4);
        assert!(relaxed.aggregate(&conn, "d0", dec!(1)).is_ok());
    }

    #[test]
    fn test_aggregate_empty_recipe_yields_empty_mapping() {
        let conn = setup_conn();
        seed_recipe(&conn, "empty", "空配方", dec!(1), &[], &[]);

        let resolver = RecipeResolver::default();
        let agg = resolver.aggregate(&conn, "empty", dec!(5)).unwrap();
        assert!(agg.is_empty());
    }

    #[test]
    fn test_aggregate_rejects_non_positive_multiplier() {
        let conn = setup_conn();
        seed_recipe(&conn, "r", "R", dec!(1), &[], &[]);

        let resolver = RecipeResolver::default();
        assert!(matches!(
            resolver.aggregate(&conn, "r", dec!(0)).unwrap_err(),
            EngineError::InvalidInput(_)
        ));
        assert!(matches!(
            resolver.aggregate(&conn, "r", dec!(-1)).unwrap_err(),
            EngineError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_aggregate_missing_recipe() {
        let conn = setup_conn();
        let resolver = RecipeResolver::default();
        let err = resolver.aggregate(&conn, "nope", dec!(1)).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
