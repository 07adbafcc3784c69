//! 配置管理模块
//!
//! 编译器限制参数，以及命令行工具的配置文件 / 环境变量加载。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 默认最大括号嵌套层级
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// 编译器限制
///
/// 括号嵌套层级决定了折叠和语法树构建的递归深度，
/// 对不可信输入需要限制，避免栈溢出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerLimits {
    pub max_nesting_depth: usize,
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl CompilerLimits {
    pub fn with_max_nesting_depth(max_nesting_depth: usize) -> Self {
        Self { max_nesting_depth }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    pub logging: LoggingConfig,
    pub limits: CompilerLimits,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. 环境变量（RULE_EXPR_ 前缀，如 RULE_EXPR_LIMITS__MAX_NESTING_DEPTH -> limits.max_nesting_depth）
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("RULE_EXPR_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &Path, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                Environment::with_prefix("RULE_EXPR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
