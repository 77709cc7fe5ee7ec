//! 规则引擎领域模型

use crate::error::ValidationError;
use crate::lexer::is_word;
use crate::operators::{Comparator, LogicalOperator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

/// 规则定义（规则目录中的一条记录）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    /// 用户提交的原始规则文本
    pub rule_text: String,
    pub ast: RuleNode,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(rule_text: impl Into<String>, ast: RuleNode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rule_text: rule_text.into(),
            ast,
            created_at: Utc::now(),
        }
    }
}

/// 规则树节点（条件或逻辑连接）
///
/// 构造后不可变。连接节点总是恰好持有两个子树，条件节点没有子树。
/// 规范化的 JSON 形态见 [`crate::codec`]。
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    Operand(Condition),
    Connective {
        operator: LogicalOperator,
        left: Box<RuleNode>,
        right: Box<RuleNode>,
    },
}

impl RuleNode {
    pub fn operand(condition: Condition) -> Self {
        Self::Operand(condition)
    }

    pub fn connective(operator: LogicalOperator, left: RuleNode, right: RuleNode) -> Self {
        Self::Connective {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: RuleNode, right: RuleNode) -> Self {
        Self::connective(LogicalOperator::And, left, right)
    }

    pub fn or(left: RuleNode, right: RuleNode) -> Self {
        Self::connective(LogicalOperator::Or, left, right)
    }

    pub fn is_operand(&self) -> bool {
        matches!(self, Self::Operand(_))
    }

    /// 树的深度，单个条件为 1
    ///
    /// 使用显式栈遍历，任意深度的树都不会耗尽调用栈。
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            if let Self::Connective { left, right, .. } = node {
                stack.push((left.as_ref(), depth + 1));
                stack.push((right.as_ref(), depth + 1));
            }
        }
        max
    }

    /// 条件节点数量
    pub fn condition_count(&self) -> usize {
        match self {
            Self::Operand(_) => 1,
            Self::Connective { left, right, .. } => left.condition_count() + right.condition_count(),
        }
    }

    /// 提取规则中引用的所有字段
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut BTreeSet<&'a str>) {
        match self {
            Self::Operand(cond) => {
                fields.insert(cond.field.as_str());
            }
            Self::Connective { left, right, .. } => {
                left.collect_fields(fields);
                right.collect_fields(fields);
            }
        }
    }

    /// 以最少的括号输出子树，使重新编译得到同一棵树
    fn fmt_child(
        child: &RuleNode,
        parent: LogicalOperator,
        is_right: bool,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let needs_parens = match child {
            Self::Operand(_) => false,
            Self::Connective { operator, .. } => {
                operator.precedence() < parent.precedence()
                    || (is_right && operator.precedence() == parent.precedence())
            }
        };

        if needs_parens {
            write!(f, "({})", child)
        } else {
            write!(f, "{}", child)
        }
    }
}

impl From<Condition> for RuleNode {
    fn from(condition: Condition) -> Self {
        Self::Operand(condition)
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand(cond) => write!(f, "{}", cond),
            Self::Connective {
                operator,
                left,
                right,
            } => {
                Self::fmt_child(left, *operator, false, f)?;
                write!(f, " {} ", operator)?;
                Self::fmt_child(right, *operator, true, f)
            }
        }
    }
}

/// 条件节点：字段、比较操作符、字面量
///
/// 字段名必须能被分词器还原为单个词元，保证规则树可以经规范化 JSON 原样往返。
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    comparator: Comparator,
    literal: Literal,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        comparator: Comparator,
        literal: Literal,
    ) -> Result<Self, ValidationError> {
        let field = field.into();
        if !is_word(&field) {
            return Err(ValidationError::InvalidField(field));
        }
        Ok(Self::from_tokens(field, comparator, literal))
    }

    /// 由解析器使用，各部分已经过分词
    pub(crate) fn from_tokens(field: String, comparator: Comparator, literal: Literal) -> Self {
        Self {
            field,
            comparator,
            literal,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn literal(&self) -> &Literal {
        &self.literal
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.comparator, self.literal)
    }
}

/// 条件字面量：单引号字符串或裸词
///
/// 数值不在解析时转换，求值时按比较操作符决定如何解释。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    text: String,
    quoted: bool,
}

impl Literal {
    /// 单引号字符串（不含引号），内容不能包含单引号
    pub fn quoted(content: impl Into<String>) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.contains('\'') {
            return Err(ValidationError::InvalidLiteral(content));
        }
        Ok(Self::from_quoted_token(content))
    }

    /// 裸词，必须是单个非关键字词元
    pub fn bare(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        if !is_word(&text) {
            return Err(ValidationError::InvalidLiteral(text));
        }
        Ok(Self::from_word_token(text))
    }

    pub(crate) fn from_quoted_token(content: String) -> Self {
        Self {
            text: content,
            quoted: true,
        }
    }

    pub(crate) fn from_word_token(text: String) -> Self {
        Self {
            text,
            quoted: false,
        }
    }

    /// 去掉引号后的文本
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "'{}'", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

/// 事实值：数值或字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Number(f64),
    Text(String),
}

impl FactValue {
    /// 按数值解释，字符串需可解析为有限数
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

/// 转换为字符串形式，`=` 比较使用
impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// 数值的文本形式，与 JSON 宿主环境的数字转字符串一致：
/// 绝对值不小于 1e21 或小于 1e-6 时使用指数形式（`1e+21`、`1e-7`），`-0` 记为 `0`
fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return n.to_string();
    }

    let formatted = format!("{:e}", n);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

impl From<f64> for FactValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for FactValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// 事实记录 - 提供给规则引擎的数据
///
/// 字段名不支持点号路径，按完整名称查找。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactRecord {
    values: HashMap<String, FactValue>,
}

impl FactRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FactValue>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FactValue> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FactRecord
where
    K: Into<String>,
    V: Into<FactValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}

/// 评估报告
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub matched: bool,
    /// 命中的条件，格式为 `路径: 条件`
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
}
