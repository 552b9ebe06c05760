//! 脚本沙箱 - 在隔离的 Rhai 引擎中执行用户的 pre/post 脚本
//!
//! 脚本语言是 [Rhai](https://rhai.rs)，语法接近 JavaScript，但有几处差异：
//!
//! - 字符串必须用双引号或反引号，单引号表示字符字面量：
//!   `environment.set("VAR", "NEW")` 合法，`environment.set('VAR', 'NEW')` 是语法错误
//! - 变量用 `let` 声明，对象字面量写作 `#{ key: value }`
//! - `undefined` 和 `null` 都表示为 `()`，可用 `type_of(x) == "()"` 判断
//! - `global` 和 `module` 是保留字，不能作为变量名
//!
//! 可用的全局对象：`environment` / `variables`（变量读写，写入在脚本结束后提交）、
//! `response`（仅 post-script）、`JSON`、`Math`、`Date`、`console`，
//! 以及 `parseInt`、`parseFloat`、`encodeURIComponent`、`decodeURIComponent`。
//!
//! ```text
//! let data = response.json();
//! if response.code == 200 {
//!     variables.set("token", data.token);
//! }
//! console.log("status", response.code);
//! ```
mod capability;
mod context;
mod executor;
mod globals;

use std::time::Duration;

pub use capability::{ResponseApi, VariablesApi};
pub use context::ScriptContext;
pub use executor::{DEFAULT_SCRIPT_TIMEOUT, ScriptSandbox, execute_script};
pub use globals::{DENIED_GLOBALS, Redactor};

/// 脚本执行错误，调用方视为致命错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("Script syntax error: {0}")]
    Syntax(String),

    #[error("Script error: {0}")]
    Runtime(String),

    #[error("Script execution timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ScriptError {
    /// 原始错误消息
    pub fn message(&self) -> String {
        match self {
            ScriptError::Syntax(msg) | ScriptError::Runtime(msg) => msg.clone(),
            ScriptError::Timeout(_) => self.to_string(),
        }
    }
}
