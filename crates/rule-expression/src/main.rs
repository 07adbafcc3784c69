//! 规则表达式命令行工具
//!
//! 用于查看表达式的分词、SQL、求值语法和语法树，以及对参数求值。

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rule_expression::{AppConfig, RuleExpression, config::LoggingConfig};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rule-expr", version, about = "规则表达式编译与求值工具")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 输出表达式的全部中间结果
    Inspect {
        expression: String,
        /// 以 JSON 格式输出
        #[arg(long)]
        json: bool,
    },
    /// 输出 SQL 条件片段及参数
    Sql { expression: String },
    /// 使用 JSON 对象参数求值
    Eval {
        expression: String,
        #[arg(long, short)]
        params: String,
    },
    /// 校验表达式及变量名
    Check {
        expression: String,
        /// 允许的变量名，逗号分隔；省略时只校验表达式语法
        #[arg(long, value_delimiter = ',')]
        allow: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    init_logging(&config.logging)?;
    debug!(environment = %config.environment, limits = ?config.limits, "配置加载完成");

    match cli.command {
        Command::Inspect { expression, json } => {
            let rule = RuleExpression::with_limits(expression, config.limits);
            if json {
                println!("{}", serde_json::to_string_pretty(&inspect_json(&rule))?);
            } else {
                print_inspect(&rule)?;
            }
        }
        Command::Sql { expression } => {
            let rule = RuleExpression::with_limits(expression, config.limits);
            ensure_valid(&rule)?;
            println!("{}", rule.expression_sql());
            println!("{}", serde_json::to_string(rule.parameters_sql())?);
        }
        Command::Eval { expression, params } => {
            let rule = RuleExpression::with_limits(expression, config.limits);
            ensure_valid(&rule)?;
            let parameters: HashMap<String, Value> =
                serde_json::from_str(&params).context("参数必须是 JSON 对象")?;
            let result = rule
                .evaluate(&parameters)
                .with_context(|| format!("表达式求值失败: {}", rule))?;
            println!("{}", result);
        }
        Command::Check { expression, allow } => {
            let rule = RuleExpression::with_limits(expression, config.limits);
            ensure_valid(&rule)?;
            check_identities(&rule, &allow)?;
            println!("ok");
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.json_logs() {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn ensure_valid(rule: &RuleExpression) -> Result<()> {
    if !rule.is_valid() {
        bail!("表达式无效: {}", rule);
    }
    if let Some(e) = rule.compile_error() {
        bail!("表达式编译失败: {}", e);
    }
    Ok(())
}

/// 未指定允许列表时跳过变量名校验
fn check_identities(rule: &RuleExpression, allow: &[String]) -> Result<()> {
    if allow.is_empty() || rule.validate_identities(allow) {
        return Ok(());
    }
    let unknown: Vec<_> = rule
        .identities()
        .iter()
        .filter(|identity| !allow.contains(identity))
        .collect();
    bail!("存在未允许的变量: {:?}", unknown);
}

fn inspect_json(rule: &RuleExpression) -> Value {
    json!({
        "expression": rule.expression(),
        "valid": rule.is_valid(),
        "identities": rule.identities(),
        "tokens": rule.tokens(),
        "collapsed": rule.collapsed(),
        "sql": rule.sql(),
        "valuate": rule.expression_valuate(),
        "compile_error": rule.compile_error().map(ToString::to_string),
        "ast": rule.ast_root(),
    })
}

fn print_inspect(rule: &RuleExpression) -> Result<()> {
    println!("expression:  {}", rule.expression());
    println!("valid:       {}", rule.is_valid());
    println!("identities:  {}", rule.identities().join(", "));
    println!("normalized:  {}", rule.normalized());
    println!("tokens:");
    for token in rule.tokens() {
        println!("  {:<14} {}", token.kind.to_string(), token.value);
    }
    if !rule.is_valid() {
        return Ok(());
    }
    println!("sql:         {}", rule.expression_sql());
    println!("parameters:  {}", serde_json::to_string(rule.parameters_sql())?);
    println!("valuate:     {}", rule.expression_valuate());
    if let Some(e) = rule.compile_error() {
        println!("compile:     {}", e);
    }
    if let Some(root) = rule.ast_root() {
        println!("ast:\n{}", serde_json::to_string_pretty(root)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_check_identities() {
        let rule = RuleExpression::new("a == 1 && b-c != 'x'");
        assert!(check_identities(&rule, &allow(&["a", "b-c"])).is_ok());
        assert!(check_identities(&rule, &[]).is_ok());

        let err = check_identities(&rule, &allow(&["a"])).unwrap_err();
        assert!(err.to_string().contains("b-c"));
        // 库接口对空列表返回 false，命令行将其视为未配置
        assert!(!rule.validate_identities(allow(&[]).as_slice()));
    }

    #[test]
    fn test_inspect_json_reports_compile_error() {
        let rule = RuleExpression::new("a regexp '('");
        let value = inspect_json(&rule);
        assert!(value["compile_error"].as_str().unwrap().contains("正则"));
        assert!(ensure_valid(&rule).is_err());

        let value = inspect_json(&RuleExpression::new("a == 1"));
        assert!(value["compile_error"].is_null());
    }
}
