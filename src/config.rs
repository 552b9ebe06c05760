use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::model::Request;
use crate::store::MemoryStore;
use crate::{EngineError, Result};

/// 工作区 id（CLI 只有一个工作区）
pub const CLI_WORKSPACE_ID: &str = "ws_cli";

const DATA_DIR_ENV: &str = "RUPOST_DATA_DIR";

/// `rupost.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

/// `[engine]` 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub script_timeout_ms: u64,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
    pub max_body_bytes: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            script_timeout_ms: 1000,
            request_timeout_secs: 30,
            data_dir: PathBuf::from(".rupost"),
            max_body_bytes: None,
        }
    }
}

impl EngineSettings {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 数据目录，`RUPOST_DATA_DIR` 优先
    pub fn data_dir(&self) -> PathBuf {
        std::env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.data_dir.clone())
    }
}

/// `[environments.<name>]` 段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfig {
    /// 机密变量的 key
    #[serde(default)]
    pub secrets: Vec<String>,

    #[serde(flatten)]
    pub variables: BTreeMap<String, String>,
}

impl EngineConfig {
    pub fn get_environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments.get(name)
    }
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "rupost.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            EngineError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/rupost/
    ///
    /// 找到但无法解析的文件返回错误
    pub fn find_and_load() -> Result<Option<EngineConfig>> {
        match Self::find() {
            Some(path) => Self::load_from_path(path).map(Some),
            None => Ok(None),
        }
    }

    fn find() -> Option<PathBuf> {
        if let Ok(mut current) = std::env::current_dir() {
            loop {
                let config_path = current.join(Self::CONFIG_FILE);
                if config_path.exists() {
                    return Some(config_path);
                }
                if !current.pop() {
                    break;
                }
            }
        }

        let config_path = dirs::home_dir()?
            .join(".config")
            .join("rupost")
            .join(Self::CONFIG_FILE);
        config_path.exists().then_some(config_path)
    }

    /// 解析系统环境变量引用 `${VAR}`，未设置的保持原样
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }

    /// 构建 CLI 使用的内存存储
    ///
    /// 选中的环境（或只有 `--var` 时的 `default` 环境）被设为激活；
    /// 两者都没有时请求不带环境执行，脚本被跳过。
    pub fn build_store(
        config: &EngineConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
        request: Request,
    ) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        store.add_request(CLI_WORKSPACE_ID, request);

        let env_config = match env_name {
            Some(name) => Some(config.get_environment(name).ok_or_else(|| {
                EngineError::Config(format!("Environment '{}' not found in config", name))
            })?),
            None => None,
        };

        if env_config.is_none() && cli_vars.is_empty() {
            return Ok(store);
        }

        let mut values: BTreeMap<String, String> = BTreeMap::new();
        let mut secrets: &[String] = &[];
        if let Some(env) = env_config {
            for (key, value) in &env.variables {
                values.insert(key.clone(), Self::resolve_env_vars(value));
            }
            secrets = &env.secrets;
        }
        // CLI 覆盖（优先级最高）
        for (key, value) in cli_vars {
            values.insert(key.clone(), value.clone());
        }

        let environment =
            store.add_environment(CLI_WORKSPACE_ID, env_name.unwrap_or("default"), true);
        for (key, value) in values {
            let is_secret = secrets.contains(&key);
            store.add_variable(&environment.id, key, value, is_secret)?;
        }

        Ok(store)
    }
}
