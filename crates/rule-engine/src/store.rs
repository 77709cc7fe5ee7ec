//! 规则目录
//!
//! 使用 DashMap 提供线程安全的内存规则目录，支持规则的保存、查询、删除，
//! 以及按创建时间获取最新规则。

use crate::error::{Result, RuleError};
use crate::models::Rule;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 规则目录
#[derive(Clone, Default)]
pub struct RuleStore {
    rules: Arc<DashMap<String, Rule>>,
    /// 最近保存的规则 ID
    latest: Arc<Mutex<Option<String>>>,
}

impl RuleStore {
    /// 创建新的规则目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 检查目录是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 保存规则，同 ID 的规则会被覆盖
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn insert(&self, rule: Rule) {
        let rule_id = rule.id.clone();
        let mut latest = self.latest.lock();
        self.rules.insert(rule_id.clone(), rule);
        *latest = Some(rule_id.clone());

        info!("规则已保存: {}", rule_id);
    }

    /// 获取规则
    pub fn get(&self, rule_id: &str) -> Option<Rule> {
        self.rules.get(rule_id).map(|r| r.clone())
    }

    /// 获取规则，不存在时返回错误
    pub fn require(&self, rule_id: &str) -> Result<Rule> {
        self.get(rule_id)
            .ok_or_else(|| RuleError::RuleNotFound(rule_id.to_string()))
    }

    /// 检查规则是否存在
    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    /// 获取最近保存的规则
    pub fn latest(&self) -> Option<Rule> {
        let latest = self.latest.lock();
        latest.as_deref().and_then(|id| self.get(id))
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn remove(&self, rule_id: &str) -> Result<Rule> {
        let mut latest = self.latest.lock();

        let Some((_, removed)) = self.rules.remove(rule_id) else {
            warn!("删除不存在的规则: {}", rule_id);
            return Err(RuleError::RuleNotFound(rule_id.to_string()));
        };

        // 删除的是最新规则时，回退到剩余规则中创建时间最晚的一条
        if latest.as_deref() == Some(rule_id) {
            *latest = self
                .rules
                .iter()
                .max_by_key(|r| r.created_at)
                .map(|r| r.key().clone());
        }

        info!("规则已删除: {}", rule_id);
        Ok(removed)
    }

    /// 获取所有规则，按创建时间升序
    pub fn list_all(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    /// 清空所有规则
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let mut latest = self.latest.lock();
        let count = self.rules.len();
        self.rules.clear();
        *latest = None;
        info!("已清空 {} 条规则", count);
    }

    /// 获取目录统计信息
    pub fn stats(&self) -> RuleStoreStats {
        let rules_count = self.rules.len();
        let total_conditions: usize = self
            .rules
            .iter()
            .map(|r| r.ast.condition_count())
            .sum();

        RuleStoreStats {
            rules_count,
            total_conditions,
            avg_conditions_per_rule: if rules_count > 0 {
                total_conditions as f64 / rules_count as f64
            } else {
                0.0
            },
        }
    }
}

/// 规则目录统计信息
#[derive(Debug, Clone)]
pub struct RuleStoreStats {
    /// 规则总数
    pub rules_count: usize,
    /// 所有规则的条件总数
    pub total_conditions: usize,
    /// 平均每条规则的条件数
    pub avg_conditions_per_rule: f64,
}
