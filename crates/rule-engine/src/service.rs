//! 规则服务
//!
//! 规则引擎核心之外的边界层：在调用解析器与求值器之前施加输入限制
//! （规则长度、括号嵌套深度、规则树深度、属性白名单），维护规则目录并输出日志。

use crate::codec::decode;
use crate::combiner::{combine_with, combined_depth};
use crate::error::{Result, ValidationError};
use crate::evaluator::{Evaluator, MissingFieldPolicy};
use crate::lexer::{nesting_depth, tokenize};
use crate::models::{EvaluationReport, FactRecord, Rule, RuleNode};
use crate::parser::parse;
use crate::store::RuleStore;
use rules_shared::config::EngineConfig;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// 规则服务
#[derive(Clone)]
pub struct RuleService {
    config: EngineConfig,
    store: RuleStore,
    evaluator: Evaluator,
}

impl RuleService {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(config, RuleStore::new())
    }

    pub fn with_store(config: EngineConfig, store: RuleStore) -> Self {
        let policy = if config.strict_missing_fields {
            MissingFieldPolicy::Error
        } else {
            MissingFieldPolicy::NoMatch
        };

        Self {
            config,
            store,
            evaluator: Evaluator::new().with_missing_field_policy(policy),
        }
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 编译规则文本
    #[instrument(skip(self, rule_text), fields(length = rule_text.len()))]
    pub fn compile(&self, rule_text: &str) -> Result<RuleNode> {
        let result = self.compile_checked(rule_text);

        match &result {
            Ok(tree) => debug!(
                conditions = tree.condition_count(),
                depth = tree.depth(),
                "Rule compiled"
            ),
            Err(e) => warn!(error = %e, code = e.code(), "Rule rejected"),
        }

        result
    }

    fn compile_checked(&self, rule_text: &str) -> Result<RuleNode> {
        if rule_text.len() > self.config.max_rule_length {
            return Err(ValidationError::RuleTooLong {
                length: rule_text.len(),
                max: self.config.max_rule_length,
            }
            .into());
        }

        let tokens = tokenize(rule_text)?;

        let depth = nesting_depth(&tokens);
        if depth > self.config.max_nesting_depth {
            return Err(ValidationError::NestingTooDeep {
                depth,
                max: self.config.max_nesting_depth,
            }
            .into());
        }

        let tree = parse(&tokens)?;
        self.check_attributes(&tree)?;
        Ok(tree)
    }

    fn check_attributes(&self, tree: &RuleNode) -> Result<()> {
        if let Some(field) = tree
            .fields()
            .into_iter()
            .find(|field| !self.config.is_attribute_allowed(field))
        {
            return Err(ValidationError::UnknownAttribute(field.to_string()).into());
        }
        Ok(())
    }

    fn check_tree_depth(&self, tree: &RuleNode) -> Result<()> {
        self.check_depth(tree.depth())
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_tree_depth {
            return Err(ValidationError::TreeTooDeep {
                depth,
                max: self.config.max_tree_depth,
            }
            .into());
        }
        Ok(())
    }

    /// 在折叠之前检查组合结果的深度
    fn check_combined_depth(&self, trees: &[RuleNode]) -> Result<()> {
        match combined_depth(trees) {
            Some(depth) => self.check_depth(depth),
            None => Ok(()),
        }
    }

    /// 解码外部传入的规范化规则树，并施加与规则文本相同的限制
    #[instrument(skip_all)]
    pub fn decode_tree(&self, ast: &Value) -> Result<RuleNode> {
        let result = self.decode_checked(ast);

        if let Err(e) = &result {
            warn!(error = %e, code = e.code(), "Invalid AST received");
        }
        result
    }

    fn decode_checked(&self, ast: &Value) -> Result<RuleNode> {
        let tree = decode(ast)?;
        self.check_tree_depth(&tree)?;
        self.check_attributes(&tree)?;
        Ok(tree)
    }

    /// 编译并保存规则
    #[instrument(skip(self, rule_text))]
    pub fn create_rule(&self, rule_text: &str) -> Result<Rule> {
        let ast = self.compile(rule_text)?;
        let rule = Rule::new(rule_text, ast);
        self.store.insert(rule.clone());

        info!(rule_id = %rule.id, "Rule created");
        Ok(rule)
    }

    /// 编译多条规则文本并组合
    #[instrument(skip(self, rule_texts), fields(count = rule_texts.len()))]
    pub fn combine_texts<S: AsRef<str>>(&self, rule_texts: &[S], connective: &str) -> Result<RuleNode> {
        let trees = rule_texts
            .iter()
            .map(|text| self.compile(text.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        self.check_combined_depth(&trees)
            .inspect_err(|e| warn!(error = %e, "Combined rule rejected"))?;
        let combined = combine_with(trees, connective)?;
        info!(conditions = combined.condition_count(), "Rules combined");
        Ok(combined)
    }

    /// 按 ID 组合目录中的规则
    #[instrument(skip(self, rule_ids), fields(count = rule_ids.len()))]
    pub fn combine_rules<S: AsRef<str>>(&self, rule_ids: &[S], connective: &str) -> Result<RuleNode> {
        let trees = rule_ids
            .iter()
            .map(|id| self.store.require(id.as_ref()).map(|rule| rule.ast))
            .collect::<Result<Vec<_>>>()?;

        self.check_combined_depth(&trees)
            .inspect_err(|e| warn!(error = %e, "Combined rule rejected"))?;
        let combined = combine_with(trees, connective)?;
        info!(conditions = combined.condition_count(), "Stored rules combined");
        Ok(combined)
    }

    /// 评估规则树
    pub fn evaluate(&self, tree: &RuleNode, facts: &FactRecord) -> Result<bool> {
        self.check_tree_depth(tree)?;
        let eligible = self.evaluator.evaluate(tree, facts)?;
        debug!(eligible, "Rule evaluated");
        Ok(eligible)
    }

    /// 评估规则树并返回评估报告
    pub fn explain(&self, tree: &RuleNode, facts: &FactRecord) -> Result<EvaluationReport> {
        self.check_tree_depth(tree)?;
        let report = self.evaluator.explain(tree, facts)?;
        debug!(
            matched = report.matched,
            matched_conditions = report.matched_conditions.len(),
            "Rule explained"
        );
        Ok(report)
    }

    /// 评估目录中的规则
    #[instrument(skip(self, facts))]
    pub fn evaluate_rule(&self, rule_id: &str, facts: &FactRecord) -> Result<bool> {
        let rule = self.store.require(rule_id)?;
        self.evaluate(&rule.ast, facts)
    }

    /// 评估外部传入的规范化规则树与事实 JSON
    #[instrument(skip_all)]
    pub fn evaluate_json(&self, ast: &Value, facts: &Value) -> Result<bool> {
        let tree = self.decode_tree(ast)?;
        let facts = FactRecord::from_value(facts.clone())?;
        self.evaluate(&tree, &facts)
    }
}
