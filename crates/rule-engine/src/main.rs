//! 资格规则引擎命令行入口

use std::process::ExitCode;

use clap::Parser;
use rule_engine::RuleService;
use rule_engine::cli::{Cli, CommandRunner};
use rule_engine::error::RuleError;
use rules_shared::config::AppConfig;
use rules_shared::observability;
use serde_json::json;
use tracing::{error, info};

const SERVICE_NAME: &str = "rule-engine";

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 统一加载配置，失败时使用默认值
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 命令行参数覆盖配置文件中的日志设置
    let mut obs_config = config.observability.clone().with_service_name(SERVICE_NAME);
    if let Some(level) = &cli.log_level {
        obs_config.log_level = level.clone();
    }
    obs_config.json_logs |= cli.json_logs;

    let _guard = match observability::init(&obs_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            observability::ObservabilityGuard::empty()
        }
    };

    info!(environment = %config.environment, "Starting rule-engine...");

    let runner = CommandRunner::new(RuleService::new(config.engine));

    match runner.run(cli.command) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let (code, status) = match err.downcast_ref::<RuleError>() {
                Some(rule_err) => (rule_err.code(), 2),
                None => ("INTERNAL_ERROR", 1),
            };
            error!(code, error = %err, "Command failed");
            eprintln!("{}", json!({ "error": code, "message": format!("{:#}", err) }));
            ExitCode::from(status)
        }
    }
}
