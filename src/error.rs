use thiserror::Error;

use crate::http::TransportError;
use crate::runner::PipelineStage;
use crate::sandbox::ScriptError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("请求不存在: {0}")]
    RequestNotFound(String),

    #[error("存储错误: {0}")]
    Store(String),

    #[error("脚本执行失败 ({stage}): {source}")]
    Script {
        stage: PipelineStage,
        #[source]
        source: ScriptError,
    },

    #[error("传输层错误: {0}")]
    Transport(#[from] TransportError),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn store(message: impl Into<String>) -> Self {
        EngineError::Store(message.into())
    }

    /// 脚本阶段的错误
    pub fn script(stage: PipelineStage, source: ScriptError) -> Self {
        EngineError::Script { stage, source }
    }
}

// Add conversion from anyhow::Error
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Other(err.to_string())
    }
}

/// Result type for rupost-engine crate
pub type Result<T> = std::result::Result<T, EngineError>;
