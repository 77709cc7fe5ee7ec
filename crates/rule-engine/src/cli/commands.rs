//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。

use clap::{Args, Parser, Subcommand};

/// 资格规则引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "rule-engine")]
#[command(version, about = "资格规则编译、组合与评估工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，未指定时使用配置文件
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// 以 JSON 格式输出日志
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 编译规则文本，输出规范化规则树
    Compile {
        /// 规则文本，如 "age > 30 AND department = 'Sales'"
        rule: String,
    },

    /// 按逻辑连接词组合多条规则
    ///
    /// 组合按输入顺序左折叠：((r1 op r2) op r3)。
    Combine {
        /// 逻辑连接词（AND 或 OR）
        #[arg(short, long, default_value = "AND")]
        operator: String,

        /// 待组合的规则文本
        rules: Vec<String>,
    },

    /// 针对事实记录评估规则
    Evaluate(EvaluateArgs),
}

/// evaluate 子命令参数
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// 规则文本
    #[arg(short, long, conflicts_with = "ast", required_unless_present = "ast")]
    pub rule: Option<String>,

    /// 规范化规则树 JSON 文件路径
    #[arg(short, long)]
    pub ast: Option<String>,

    /// 事实记录 JSON，如 '{"age": 35}'
    #[arg(short, long)]
    pub facts: String,

    /// 输出命中的条件与评估追踪
    #[arg(long)]
    pub explain: bool,
}
