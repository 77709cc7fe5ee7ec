//! 命令执行器
//!
//! 将命令行参数转化为规则服务调用，结果以 JSON 返回给调用方输出。

use std::fs;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::info;

use crate::codec::encode;
use crate::error::RuleError;
use crate::models::FactRecord;
use crate::service::RuleService;

use super::commands::{Commands, EvaluateArgs};

/// 命令执行器
pub struct CommandRunner {
    service: RuleService,
}

impl CommandRunner {
    pub fn new(service: RuleService) -> Self {
        Self { service }
    }

    /// 执行命令，返回需要输出的 JSON
    ///
    /// 规则相关的失败以 [`RuleError`] 形式包装在 `anyhow::Error` 中，
    /// 调用方可以通过 `downcast_ref` 区分。
    pub fn run(&self, command: Commands) -> Result<Value> {
        match command {
            Commands::Compile { rule } => self.run_compile(&rule),
            Commands::Combine { operator, rules } => self.run_combine(&operator, &rules),
            Commands::Evaluate(args) => self.run_evaluate(args),
        }
    }

    /// 执行 compile 命令
    pub fn run_compile(&self, rule: &str) -> Result<Value> {
        let tree = self.service.compile(rule)?;
        Ok(encode(&tree))
    }

    /// 执行 combine 命令
    pub fn run_combine(&self, operator: &str, rules: &[String]) -> Result<Value> {
        let tree = self.service.combine_texts(rules, operator)?;
        Ok(encode(&tree))
    }

    /// 执行 evaluate 命令
    pub fn run_evaluate(&self, args: EvaluateArgs) -> Result<Value> {
        let tree = match (&args.rule, &args.ast) {
            (Some(rule), _) => self.service.compile(rule)?,
            (None, Some(path)) => {
                let content =
                    fs::read_to_string(path).with_context(|| format!("读取规则树文件失败: {}", path))?;
                let value: Value = serde_json::from_str(&content).map_err(RuleError::from)?;
                self.service.decode_tree(&value)?
            }
            (None, None) => anyhow::bail!("必须指定 --rule 或 --ast"),
        };

        let facts = FactRecord::from_json(&args.facts).map_err(RuleError::from)?;

        if args.explain {
            let report = self.service.explain(&tree, &facts)?;
            info!(matched = report.matched, "Rule explained");
            return Ok(serde_json::to_value(report)?);
        }

        let eligible = self.service.evaluate(&tree, &facts)?;
        info!(eligible, "Rule evaluated");
        Ok(json!({ "eligible": eligible }))
    }
}
