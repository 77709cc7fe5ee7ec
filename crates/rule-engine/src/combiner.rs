//! 规则树组合
//!
//! 以指定连接词左折叠多棵规则树，不检查也不改写输入树的内部结构。

use crate::error::ValidationError;
use crate::models::RuleNode;
use crate::operators::LogicalOperator;

/// 组合多棵规则树
///
/// 单棵树原样返回；多棵树按 `((t1 op t2) op t3) ...` 左折叠。
pub fn combine(
    trees: impl IntoIterator<Item = RuleNode>,
    operator: LogicalOperator,
) -> Result<RuleNode, ValidationError> {
    let mut trees = trees.into_iter();
    let first = trees.next().ok_or(ValidationError::EmptyCombination)?;

    Ok(trees.fold(first, |combined, tree| {
        RuleNode::connective(operator, combined, tree)
    }))
}

/// 组合结果的深度，无需构建组合树
///
/// 左折叠每增加一棵树，新根的深度为 `1 + max(已组合深度, 该树深度)`。
pub fn combined_depth(trees: &[RuleNode]) -> Option<usize> {
    trees
        .iter()
        .map(RuleNode::depth)
        .reduce(|combined, depth| 1 + combined.max(depth))
}

/// 以字符串形式的连接词组合，仅接受 `AND` 与 `OR`
pub fn combine_with(
    trees: impl IntoIterator<Item = RuleNode>,
    connective: &str,
) -> Result<RuleNode, ValidationError> {
    let operator: LogicalOperator = connective.parse()?;
    combine(trees, operator)
}
