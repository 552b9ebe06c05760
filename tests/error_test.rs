use std::time::Duration;

use rupost_engine::http::TransportError;
use rupost_engine::sandbox::ScriptError;
use rupost_engine::{EngineError, PipelineStage, Result};

#[test]
fn test_request_not_found() {
    let err = EngineError::RequestNotFound("req_1".to_string());
    assert_eq!(err.to_string(), "请求不存在: req_1");
}

#[test]
fn test_script_error_carries_stage() {
    let err = EngineError::script(
        PipelineStage::PostScript,
        ScriptError::Runtime("boom".to_string()),
    );
    assert_eq!(err.to_string(), "脚本执行失败 (post-script): Script error: boom");
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_script_timeout_message() {
    let err = ScriptError::Timeout(Duration::from_millis(100));
    assert_eq!(err.to_string(), "Script execution timed out after 100ms");
}

#[test]
fn test_transport_error_conversion() {
    let err: EngineError = TransportError::Configuration("bad tls".to_string()).into();
    assert!(matches!(err, EngineError::Transport(_)));
    assert!(err.to_string().contains("bad tls"));
}

#[test]
fn test_error_conversion_from_anyhow() {
    let anyhow_err = anyhow::anyhow!("test anyhow error");
    let engine_err: EngineError = anyhow_err.into();
    assert!(engine_err.to_string().contains("test anyhow error"));
}

#[test]
fn test_result_type() {
    fn returns_error() -> Result<()> {
        Err(EngineError::store("disk full"))
    }

    match returns_error() {
        Err(EngineError::Store(msg)) => assert_eq!(msg, "disk full"),
        _ => panic!("Expected Store error"),
    }
}
