//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use crate::observability::ObservabilityConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 规则引擎边界限制
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 规则文本最大字节数
    pub max_rule_length: usize,
    /// 规则文本最大括号嵌套深度
    pub max_nesting_depth: usize,
    /// 外部传入规则树的最大深度
    pub max_tree_depth: usize,
    /// 允许在条件中引用的属性，为空时不限制
    pub allowed_attributes: Vec<String>,
    /// 字段缺失时返回错误而不是判定条件不成立
    pub strict_missing_fields: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rule_length: 4096,
            max_nesting_depth: 32,
            max_tree_depth: 256,
            allowed_attributes: Vec::new(),
            strict_missing_fields: false,
        }
    }
}

impl EngineConfig {
    /// 属性是否在允许列表中
    pub fn is_attribute_allowed(&self, attribute: &str) -> bool {
        self.allowed_attributes.is_empty() || self.allowed_attributes.iter().any(|a| a == attribute)
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（RULES__ 前缀，双下划线分隔层级，
    ///    如 RULES__ENGINE__MAX_NESTING_DEPTH -> engine.max_nesting_depth）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("RULES_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), service_name, &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &Path, service_name: &str, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // 默认配置
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            // 加载默认配置文件
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // 加载环境特定配置
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            // 加载服务特定配置（如 rule-engine.toml）
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            // 环境变量覆盖（RULES__ENGINE__MAX_RULE_LENGTH -> engine.max_rule_length）
            .add_source(
                Environment::with_prefix("RULES")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("engine.allowed_attributes")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
