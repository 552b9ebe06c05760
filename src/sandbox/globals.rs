//! 沙箱中暴露给脚本的全局白名单
//!
//! 每次执行都会重新注册到新的 Engine / Scope 中，这里只保存常量定义。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use rhai::{Dynamic, Engine, EvalAltResult, FLOAT, INT, Scope};
use tracing::{error, info, warn};

/// 以 `()` 常量形式存在的宿主能力名称，脚本读取时得到 unit
pub const DENIED_GLOBALS: &[&str] = &[
    "process",
    "require",
    "module",
    "exports",
    "globalThis",
    "Function",
    "Reflect",
    "Proxy",
    "fetch",
    "setTimeout",
    "setInterval",
];

/// 被禁用的脚本语言关键字
pub const DISABLED_SYMBOLS: &[&str] = &["eval", "import", "export"];

const REDACTED: &str = "******";

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// 替换日志输出中的 secret 变量值
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Arc<Vec<String>>,
}

impl Redactor {
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        // 长的先替换，避免部分重叠的值漏出
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        Self {
            secrets: Arc::new(secrets),
        }
    }

    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JsonApi;

#[derive(Debug, Clone, Copy)]
pub struct MathApi;

#[derive(Debug, Clone, Copy)]
pub struct DateApi;

/// 代理到宿主 tracing 的 console
#[derive(Debug, Clone)]
pub struct ConsoleApi {
    redactor: Redactor,
}

#[derive(Clone, Copy)]
enum Level {
    Info,
    Warn,
    Error,
}

impl ConsoleApi {
    fn emit(&self, level: Level, values: &[Dynamic]) {
        let line = values.iter().map(to_text).collect::<Vec<_>>().join(" ");
        let line = self.redactor.redact(&line);
        match level {
            Level::Info => info!(target: "script", "{}", line),
            Level::Warn => warn!(target: "script", "{}", line),
            Level::Error => error!(target: "script", "{}", line),
        }
    }
}

/// 脚本值转换为文本：字符串原样，`()` 为空串，数组/对象序列化为 JSON
pub fn to_text(value: &Dynamic) -> String {
    if value.is_unit() {
        return String::new();
    }
    if value.is_string() {
        return value.clone().into_string().unwrap_or_default();
    }
    if value.is_map() || value.is_array() {
        if let Ok(json) = rhai::serde::from_dynamic::<serde_json::Value>(value) {
            return json.to_string();
        }
    }
    value.to_string()
}

pub(crate) fn register(engine: &mut Engine, redactor: &Redactor) {
    let print_redactor = redactor.clone();
    engine.on_print(move |text| info!(target: "script", "{}", print_redactor.redact(text)));
    let debug_redactor = redactor.clone();
    engine.on_debug(move |text, _source, _pos| {
        tracing::debug!(target: "script", "{}", debug_redactor.redact(text))
    });

    engine
        .register_type_with_name::<JsonApi>("JSON")
        .register_fn("parse", |_: JsonApi, text: &str| -> RhaiResult<Dynamic> {
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(|e| format!("JSON.parse: {}", e))?;
            rhai::serde::to_dynamic(value)
        })
        .register_fn("stringify", |_: JsonApi, value: Dynamic| -> RhaiResult<String> {
            let json: serde_json::Value = rhai::serde::from_dynamic(&value)?;
            Ok(json.to_string())
        });

    engine
        .register_type_with_name::<MathApi>("Math")
        .register_fn("floor", |_: MathApi, x: FLOAT| x.floor())
        .register_fn("floor", |_: MathApi, x: INT| x)
        .register_fn("ceil", |_: MathApi, x: FLOAT| x.ceil())
        .register_fn("ceil", |_: MathApi, x: INT| x)
        .register_fn("round", |_: MathApi, x: FLOAT| (x + 0.5).floor())
        .register_fn("round", |_: MathApi, x: INT| x)
        .register_fn("abs", |_: MathApi, x: FLOAT| x.abs())
        .register_fn("abs", |_: MathApi, x: INT| x.saturating_abs())
        .register_fn("min", |_: MathApi, a: FLOAT, b: FLOAT| a.min(b))
        .register_fn("min", |_: MathApi, a: INT, b: INT| a.min(b))
        .register_fn("max", |_: MathApi, a: FLOAT, b: FLOAT| a.max(b))
        .register_fn("max", |_: MathApi, a: INT, b: INT| a.max(b))
        .register_fn("pow", |_: MathApi, a: FLOAT, b: FLOAT| a.powf(b))
        .register_fn("pow", |_: MathApi, a: INT, b: INT| (a as FLOAT).powf(b as FLOAT))
        .register_fn("sqrt", |_: MathApi, x: FLOAT| x.sqrt())
        .register_fn("sqrt", |_: MathApi, x: INT| (x as FLOAT).sqrt())
        .register_fn("random", |_: MathApi| rand::random::<FLOAT>());

    engine
        .register_type_with_name::<DateApi>("Date")
        .register_fn("now", |_: DateApi| chrono::Utc::now().timestamp_millis() as INT)
        .register_fn("iso", |_: DateApi| chrono::Utc::now().to_rfc3339());

    engine.register_type_with_name::<ConsoleApi>("Console");
    register_console_method(engine, "log", Level::Info);
    register_console_method(engine, "info", Level::Info);
    register_console_method(engine, "warn", Level::Warn);
    register_console_method(engine, "error", Level::Error);

    engine
        .register_fn("parseInt", parse_int)
        .register_fn("parseInt", |x: INT| x)
        .register_fn("parseInt", |x: FLOAT| x.trunc() as INT)
        .register_fn("parseFloat", parse_float)
        .register_fn("parseFloat", |x: FLOAT| x)
        .register_fn("parseFloat", |x: INT| x as FLOAT)
        .register_fn("encodeURIComponent", |s: &str| urlencoding::encode(s).into_owned())
        .register_fn("decodeURIComponent", |s: &str| -> RhaiResult<String> {
            urlencoding::decode(s)
                .map(|decoded| decoded.into_owned())
                .map_err(|e| format!("URIError: {}", e).into())
        });
}

/// console 方法接受 0 到 5 个参数，以空格连接输出
fn register_console_method(engine: &mut Engine, name: &str, level: Level) {
    engine
        .register_fn(name, move |c: ConsoleApi| c.emit(level, &[]))
        .register_fn(name, move |c: ConsoleApi, a: Dynamic| c.emit(level, &[a]))
        .register_fn(name, move |c: ConsoleApi, a: Dynamic, b: Dynamic| {
            c.emit(level, &[a, b])
        })
        .register_fn(name, move |c: ConsoleApi, a: Dynamic, b: Dynamic, d: Dynamic| {
            c.emit(level, &[a, b, d])
        })
        .register_fn(
            name,
            move |c: ConsoleApi, a: Dynamic, b: Dynamic, d: Dynamic, e: Dynamic| {
                c.emit(level, &[a, b, d, e])
            },
        )
        .register_fn(
            name,
            move |c: ConsoleApi, a: Dynamic, b: Dynamic, d: Dynamic, e: Dynamic, f: Dynamic| {
                c.emit(level, &[a, b, d, e, f])
            },
        );
}

/// 注入白名单对象与被拒绝的名称
pub(crate) fn push_into(scope: &mut Scope<'_>, redactor: &Redactor) {
    for name in DENIED_GLOBALS {
        scope.push_constant_dynamic(*name, Dynamic::UNIT);
    }

    scope
        .push("JSON", JsonApi)
        .push("Math", MathApi)
        .push("Date", DateApi)
        .push(
            "console",
            ConsoleApi {
                redactor: redactor.clone(),
            },
        );
}

/// 解析前导整数，无法解析时返回 `()`
fn parse_int(text: &str) -> Dynamic {
    static INT_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = INT_REGEX.get_or_init(|| Regex::new(r"^[+-]?\d+").unwrap());

    re.find(text.trim_start())
        .and_then(|m| m.as_str().parse::<INT>().ok())
        .map(Dynamic::from)
        .unwrap_or(Dynamic::UNIT)
}

/// 解析前导浮点数，无法解析时返回 `()`
fn parse_float(text: &str) -> Dynamic {
    static FLOAT_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = FLOAT_REGEX.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap()
    });

    re.find(text.trim_start())
        .and_then(|m| m.as_str().parse::<FLOAT>().ok())
        .map(Dynamic::from)
        .unwrap_or(Dynamic::UNIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redactor_replaces_secrets() {
        let redactor = Redactor::new(vec!["s3cret".to_string(), String::new()]);
        assert_eq!(redactor.redact("token=s3cret;"), "token=******;");
        assert_eq!(redactor.redact("nothing here"), "nothing here");
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int("42px").as_int().unwrap(), 42);
        assert_eq!(parse_int("  -7").as_int().unwrap(), -7);
        assert!(parse_int("abc").is_unit());
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float("3.5kg").as_float().unwrap(), 3.5);
        assert_eq!(parse_float(".25").as_float().unwrap(), 0.25);
        assert!(parse_float("x1").is_unit());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&Dynamic::from("abc".to_string())), "abc");
        assert_eq!(to_text(&Dynamic::UNIT), "");
        assert_eq!(to_text(&Dynamic::from(5_i64)), "5");
    }
}
