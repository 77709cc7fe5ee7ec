//! 规则求值
//!
//! 递归遍历规则树，根据事实记录得出布尔结论。
//! `>` 与 `<` 按数值比较；`=` 将事实值转换为字符串后与字面量逐字比较。

use crate::error::EvalError;
use crate::models::{Condition, EvaluationReport, FactRecord, FactValue, Literal, RuleNode};
use crate::operators::{Comparator, LogicalOperator};
use serde::{Deserialize, Serialize};

/// 字段缺失时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// 条件不成立，不报错
    #[default]
    NoMatch,
    /// 返回 [`EvalError::MissingField`]
    Error,
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `condition` - 规则中的条件
    /// * `fact` - 从事实记录中取得的字段值
    /// * `policy` - 字段缺失时的处理策略
    pub fn evaluate(
        condition: &Condition,
        fact: Option<&FactValue>,
        policy: MissingFieldPolicy,
    ) -> Result<bool, EvalError> {
        let fact = match (fact, policy) {
            (Some(v), _) => v,
            (None, MissingFieldPolicy::NoMatch) => return Ok(false),
            (None, MissingFieldPolicy::Error) => {
                return Err(EvalError::MissingField(condition.field().to_string()));
            }
        };

        match condition.comparator() {
            Comparator::Gt => Self::compare(condition, fact, |a, b| a > b),
            Comparator::Lt => Self::compare(condition, fact, |a, b| a < b),
            Comparator::Eq => Ok(Self::eq(fact, condition.literal())),
        }
    }

    /// 字符串相等比较，数值事实先转换为字符串
    fn eq(fact: &FactValue, literal: &Literal) -> bool {
        match fact {
            FactValue::Text(s) => s == literal.text(),
            FactValue::Number(_) => fact.to_string() == literal.text(),
        }
    }

    /// 数值比较
    fn compare<F>(condition: &Condition, fact: &FactValue, cmp: F) -> Result<bool, EvalError>
    where
        F: Fn(f64, f64) -> bool,
    {
        let fact_num = fact.as_number().ok_or_else(|| EvalError::NonNumericFact {
            field: condition.field().to_string(),
            value: fact.to_string(),
        })?;

        let literal_num = Self::literal_number(condition.literal()).ok_or_else(|| {
            EvalError::NonNumericLiteral {
                field: condition.field().to_string(),
                literal: condition.literal().to_string(),
            }
        })?;

        Ok(cmp(fact_num, literal_num))
    }

    fn literal_number(literal: &Literal) -> Option<f64> {
        literal
            .text()
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    }
}

/// 规则求值器
///
/// 不持有可变状态，可在多个线程间共享。
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    missing_field: MissingFieldPolicy,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_field_policy(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_field = policy;
        self
    }

    pub fn missing_field_policy(&self) -> MissingFieldPolicy {
        self.missing_field
    }

    /// 评估规则树
    ///
    /// 连接节点的两侧总会被求值，因此任一侧的错误都会返回，与操作数顺序无关。
    pub fn evaluate(&self, node: &RuleNode, facts: &FactRecord) -> Result<bool, EvalError> {
        match node {
            RuleNode::Operand(cond) => {
                ConditionEvaluator::evaluate(cond, facts.get(cond.field()), self.missing_field)
            }
            RuleNode::Connective {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, facts)?;
                let right = self.evaluate(right, facts)?;
                Ok(Self::combine(*operator, left, right))
            }
        }
    }

    /// 评估规则树并记录命中的条件与评估追踪
    pub fn explain(&self, node: &RuleNode, facts: &FactRecord) -> Result<EvaluationReport, EvalError> {
        let mut report = EvaluationReport::default();
        let matched = self.explain_node(node, facts, &mut report, "root")?;
        report.matched = matched;
        Ok(report)
    }

    fn explain_node(
        &self,
        node: &RuleNode,
        facts: &FactRecord,
        report: &mut EvaluationReport,
        path: &str,
    ) -> Result<bool, EvalError> {
        match node {
            RuleNode::Operand(cond) => {
                let matched =
                    ConditionEvaluator::evaluate(cond, facts.get(cond.field()), self.missing_field)?;

                report.evaluation_trace.push(format!(
                    "{}: {} => {}",
                    path,
                    cond,
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                ));
                if matched {
                    report.matched_conditions.push(format!("{}: {}", path, cond));
                }

                Ok(matched)
            }
            RuleNode::Connective {
                operator,
                left,
                right,
            } => {
                let left = self.explain_node(left, facts, report, &format!("{}.left", path))?;
                let right = self.explain_node(right, facts, report, &format!("{}.right", path))?;
                let matched = Self::combine(*operator, left, right);

                report.evaluation_trace.push(format!(
                    "{}: {} => {}",
                    path,
                    operator,
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                ));

                Ok(matched)
            }
        }
    }

    fn combine(operator: LogicalOperator, left: bool, right: bool) -> bool {
        match operator {
            LogicalOperator::And => left && right,
            LogicalOperator::Or => left || right,
        }
    }
}
