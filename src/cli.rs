use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use rupost_engine::config::{ConfigLoader, EngineConfig};
use rupost_engine::http::ReqwestTransport;
use rupost_engine::model::Request;
use rupost_engine::runner::{RequestExecutor, ResponseReporter};
use rupost_engine::store::FileStore;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 发送请求定义文件（JSON）中的请求
    Send {
        /// 请求定义文件
        path: PathBuf,

        /// 使用的环境名称
        #[arg(short, long)]
        env: Option<String>,

        /// 变量覆盖 key=value，可重复
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// 配置文件路径（默认自动查找 rupost.toml）
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 显示响应头和完整 body
        #[arg(short, long)]
        verbose: bool,
    },

    /// 查看最近的响应记录
    History {
        /// 显示条数
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    Ok(match path {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::find_and_load()?.unwrap_or_default(),
    })
}

/// 读取请求定义，没有 `_id` 时用文件名补上
fn load_request(path: &Path) -> Result<Request> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    if let Some(object) = value.as_object_mut()
        && !object.contains_key("_id")
    {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "request".to_string());
        object.insert("_id".to_string(), serde_json::Value::String(stem));
    }

    serde_json::from_value(value)
        .with_context(|| format!("Invalid request definition in {}", path.display()))
}

/// 执行 send 命令，返回断言是否全部通过
pub async fn run_send(
    path: &Path,
    env: Option<&str>,
    vars: &[String],
    config_path: Option<&Path>,
    verbose: bool,
) -> Result<bool> {
    let config = load_config(config_path)?;
    let request = load_request(path)?;

    let cli_vars = vars
        .iter()
        .map(|raw| {
            ConfigLoader::parse_cli_var(raw)
                .with_context(|| format!("Invalid --var '{}', expected KEY=VALUE", raw))
        })
        .collect::<Result<Vec<_>>>()?;

    let assertions = request.assertions.clone();
    let request_id = request.id.clone();
    let workspace = Arc::new(ConfigLoader::build_store(&config, env, &cli_vars, request)?);
    let files = Arc::new(FileStore::new(config.engine.data_dir()));
    let transport = Arc::new(
        ReqwestTransport::new(config.engine.request_timeout())?
            .with_max_body_bytes(config.engine.max_body_bytes),
    );

    let executor = RequestExecutor::new(workspace, transport, files.clone(), files)
        .with_script_timeout(config.engine.script_timeout());

    let response = executor.execute_by_id(&request_id).await?;

    println!("\n{} {}\n", "Request".bold(), response.request_id.cyan());
    ResponseReporter::new(verbose).print_response(&response, &assertions);

    Ok(response.assertions_passed())
}

/// 执行 history 命令
pub fn run_history(limit: usize, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = FileStore::new(config.engine.data_dir());
    let responses = store.tail(limit)?;
    ResponseReporter::new(false).print_history(&responses);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_request_fills_missing_id() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(br#"{"method": "POST", "url": "http://example.com"}"#)
            .unwrap();
        file.flush().unwrap();

        let request = load_request(file.path()).unwrap();
        assert!(!request.id.is_empty());
        assert_eq!(request.url, "http://example.com");
    }

    #[test]
    fn test_load_request_keeps_id() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"_id": "req_42", "url": "http://example.com"}"#)
            .unwrap();
        file.flush().unwrap();

        let request = load_request(file.path()).unwrap();
        assert_eq!(request.id, "req_42");
    }

    #[test]
    fn test_cli_parses_send() {
        let cli = Cli::parse_from([
            "rupost", "send", "req.json", "--env", "dev", "--var", "a=1", "--var", "b=2",
        ]);
        match cli.command {
            Commands::Send { env, vars, .. } => {
                assert_eq!(env.as_deref(), Some("dev"));
                assert_eq!(vars, vec!["a=1".to_string(), "b=2".to_string()]);
            }
            _ => panic!("expected send"),
        }
    }
}
