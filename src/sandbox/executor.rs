use std::time::{Duration, Instant};

use rhai::packages::{
    BasicArrayPackage, BasicMapPackage, CorePackage, LogicPackage, MoreStringPackage, Package,
};
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use tracing::debug;

use crate::sandbox::globals::{self, DISABLED_SYMBOLS, Redactor};
use crate::sandbox::{ScriptContext, ScriptError, capability};

/// 默认脚本超时
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_millis(1000);

// 外层计时器的余量；正常情况下 on_progress 会先终止脚本
const TIMEOUT_GRACE: Duration = Duration::from_millis(500);

const MAX_CALL_LEVELS: usize = 64;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_STRING_SIZE: usize = 4 * 1024 * 1024;
const MAX_COLLECTION_SIZE: usize = 100_000;

/// 脚本沙箱
///
/// 每次调用都会创建全新的 Engine 和 Scope，调用之间不共享任何解释器状态。
#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    timeout: Duration,
    secrets: Vec<String>,
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptSandbox {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_SCRIPT_TIMEOUT,
            secrets: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置需要在 console 输出中隐藏的值
    pub fn with_secrets(mut self, secrets: impl IntoIterator<Item = String>) -> Self {
        self.secrets = secrets.into_iter().collect();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行脚本
    ///
    /// 空脚本直接返回原上下文，不创建沙箱。
    /// 脚本在阻塞线程中运行，超时由 Engine 的进度回调强制终止，
    /// 不依赖脚本主动让出控制权。
    pub async fn execute(
        &self,
        script: &str,
        context: ScriptContext,
    ) -> Result<ScriptContext, ScriptError> {
        if script.trim().is_empty() {
            return Ok(context);
        }

        let script = script.to_string();
        let timeout = self.timeout;
        let redactor = Redactor::new(self.secrets.iter().cloned());

        let task =
            tokio::task::spawn_blocking(move || run_isolated(&script, context, timeout, &redactor));

        match tokio::time::timeout(timeout + TIMEOUT_GRACE, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ScriptError::Runtime(format!("script task aborted: {}", e))),
            Err(_) => Err(ScriptError::Timeout(timeout)),
        }
    }
}

/// 以指定超时执行脚本
pub async fn execute_script(
    script: &str,
    context: ScriptContext,
    timeout: Duration,
) -> Result<ScriptContext, ScriptError> {
    ScriptSandbox::new()
        .with_timeout(timeout)
        .execute(script, context)
        .await
}

fn run_isolated(
    script: &str,
    mut context: ScriptContext,
    timeout: Duration,
    redactor: &Redactor,
) -> Result<ScriptContext, ScriptError> {
    let started = Instant::now();
    let engine = build_engine(started + timeout, redactor);

    let ast = engine
        .compile(script)
        .map_err(|e| ScriptError::Syntax(e.to_string()))?;

    let mut scope = Scope::new();
    globals::push_into(&mut scope, redactor);
    context.push_into(&mut scope);

    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| classify(*e, timeout))?;

    context.copy_back(&scope);
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Script finished");
    Ok(context)
}

fn build_engine(deadline: Instant, redactor: &Redactor) -> Engine {
    let mut engine = Engine::new_raw();

    engine.register_global_module(CorePackage::new().as_shared_module());
    engine.register_global_module(LogicPackage::new().as_shared_module());
    engine.register_global_module(MoreStringPackage::new().as_shared_module());
    engine.register_global_module(BasicArrayPackage::new().as_shared_module());
    engine.register_global_module(BasicMapPackage::new().as_shared_module());

    for symbol in DISABLED_SYMBOLS {
        engine.disable_symbol(*symbol);
    }

    engine.set_max_call_levels(MAX_CALL_LEVELS);
    engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_COLLECTION_SIZE);
    engine.set_max_map_size(MAX_COLLECTION_SIZE);

    engine.on_progress(move |_ops| {
        if Instant::now() >= deadline {
            Some(Dynamic::from("timeout"))
        } else {
            None
        }
    });

    globals::register(&mut engine, redactor);
    capability::register(&mut engine);

    engine
}

fn classify(error: EvalAltResult, timeout: Duration) -> ScriptError {
    match error {
        EvalAltResult::ErrorTerminated(..) => ScriptError::Timeout(timeout),
        EvalAltResult::ErrorParsing(e, _) => ScriptError::Syntax(e.to_string()),
        // throw "..." 的值直接作为消息
        EvalAltResult::ErrorRuntime(value, _) => ScriptError::Runtime(globals::to_text(&value)),
        other => ScriptError::Runtime(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variable;
    use crate::sandbox::VariablesApi;

    fn variable(key: &str, value: &str) -> Variable {
        Variable {
            id: format!("var_{}", key),
            environment_id: "env_1".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            is_secret: false,
        }
    }

    #[tokio::test]
    async fn test_empty_script_returns_context_unchanged() {
        let ctx = ScriptContext::new().with("count", 1_i64);
        let result = execute_script("", ctx, DEFAULT_SCRIPT_TIMEOUT).await.unwrap();
        assert_eq!(result.get_as::<i64>("count"), Some(1));
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_top_level_reassignment_is_copied_back() {
        let ctx = ScriptContext::new().with("count", 1_i64);
        let result = execute_script("count += 41;", ctx, DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(result.get_as::<i64>("count"), Some(42));
    }

    #[tokio::test]
    async fn test_capability_mutation_visible_to_caller() {
        let api = VariablesApi::new(&[variable("token", "old")]);
        let ctx = ScriptContext::new()
            .with("environment", api.clone())
            .with("seen", String::new());

        let script = r#"
            environment.set("token", "new");
            seen = environment.get("token");
        "#;
        let result = execute_script(script, ctx, DEFAULT_SCRIPT_TIMEOUT).await.unwrap();

        // 同一次执行中读到的仍是旧值
        assert_eq!(result.get_as::<String>("seen"), Some("old".to_string()));
        assert_eq!(api.take_pending().get("token"), Some("new"));
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let started = Instant::now();
        let err = execute_script("loop {}", ScriptContext::new(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_while_true_times_out() {
        let err = execute_script("while true {}", ScriptContext::new(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_denied_globals_are_unit() {
        let ctx = ScriptContext::new()
            .with("process_type", String::new())
            .with("require_type", String::new())
            .with("reflect_type", String::new());
        let script = r#"
            process_type = type_of(process);
            require_type = type_of(require);
            reflect_type = type_of(Reflect);
        "#;
        let result = execute_script(script, ctx, DEFAULT_SCRIPT_TIMEOUT).await.unwrap();
        assert_eq!(result.get_as::<String>("process_type"), Some("()".to_string()));
        assert_eq!(result.get_as::<String>("require_type"), Some("()".to_string()));
        assert_eq!(result.get_as::<String>("reflect_type"), Some("()".to_string()));
    }

    #[tokio::test]
    async fn test_eval_is_rejected() {
        let err = execute_script(r#"eval("40 + 2")"#, ScriptContext::new(), DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(_) | ScriptError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_syntax_error() {
        let err = execute_script("let x = ;", ScriptContext::new(), DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(_)));
    }

    #[tokio::test]
    async fn test_single_quoted_string_is_syntax_error() {
        let api = VariablesApi::new(&[]);
        let ctx = ScriptContext::new().with("environment", api);
        let err = execute_script("environment.set('VAR', 'NEW');", ctx, DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(_)));
    }

    #[tokio::test]
    async fn test_runtime_error_carries_message() {
        let err = execute_script(r#"throw "boom";"#, ScriptContext::new(), DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap_err();
        match err {
            ScriptError::Runtime(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_allow_list_helpers() {
        let ctx = ScriptContext::new()
            .with("out", String::new())
            .with("n", 0_i64)
            .with("encoded", String::new());
        let script = r#"
            let data = JSON.parse("{\"a\": [1, 2, 3]}");
            out = JSON.stringify(data.a);
            n = parseInt("12px") + Math.max(1, 2);
            encoded = encodeURIComponent("a b");
            console.log("done");
        "#;
        let result = execute_script(script, ctx, DEFAULT_SCRIPT_TIMEOUT).await.unwrap();
        assert_eq!(result.get_as::<String>("out"), Some("[1,2,3]".to_string()));
        assert_eq!(result.get_as::<i64>("n"), Some(14));
        assert_eq!(result.get_as::<String>("encoded"), Some("a%20b".to_string()));
    }

    #[tokio::test]
    async fn test_console_accepts_any_argument_count() {
        let script = r#"
            console.log();
            console.log("a", 1, 2);
            console.info("status", 200);
            console.warn("slow", 1.5, true, [1, 2]);
            console.error("a", "b", "c", "d", #{ code: 500 });
        "#;
        execute_script(script, ScriptContext::new(), DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_state_leaks_between_calls() {
        execute_script("let leaked = 1;", ScriptContext::new(), DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap();
        let err = execute_script("leaked + 1", ScriptContext::new(), DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(_)));
    }
}
