use std::sync::{Arc, Mutex, PoisonError};

use rhai::{Dynamic, Engine, Map};

use crate::model::{Header, PendingVariableUpdates, TransportResponse, Variable};
use crate::sandbox::globals::to_text;

/// 脚本中的 `environment` / `variables` 对象
///
/// `get` 读取执行前的内存变量列表；`set` 只写入待提交队列，
/// 同一次脚本内后续的 `get` 仍然读到旧值，直到执行器 flush。
#[derive(Debug, Clone)]
pub struct VariablesApi {
    variables: Arc<Vec<Variable>>,
    pending: Arc<Mutex<PendingVariableUpdates>>,
}

impl VariablesApi {
    pub fn new(variables: &[Variable]) -> Self {
        Self {
            variables: Arc::new(variables.to_vec()),
            pending: Arc::new(Mutex::new(PendingVariableUpdates::new())),
        }
    }

    /// 重复 key 时以列表中靠后的为准（与模板渲染一致）
    pub fn get(&self, key: &str) -> Option<String> {
        self.variables
            .iter()
            .rev()
            .find(|v| v.key == key)
            .map(|v| v.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(key, value);
    }

    /// 取出并清空待提交的写入
    pub fn take_pending(&self) -> PendingVariableUpdates {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// 脚本中的只读 `response` 对象（仅 post-script 可用）
#[derive(Debug, Clone)]
pub struct ResponseApi {
    code: i64,
    status: String,
    headers: Vec<Header>,
    body: String,
}

impl ResponseApi {
    pub fn new(response: &TransportResponse) -> Self {
        Self {
            code: i64::from(response.status_code),
            status: response.status_message.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
        }
    }

    fn headers_map(&self) -> Map {
        let mut map = Map::new();
        for header in &self.headers {
            map.insert(
                header.name.to_ascii_lowercase().into(),
                Dynamic::from(header.value.clone()),
            );
        }
        map
    }

    fn header(&self, name: &str) -> Dynamic {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| Dynamic::from(h.value.clone()))
            .unwrap_or(Dynamic::UNIT)
    }

    /// 按需解析 JSON body，失败时返回 `()`
    fn json(&self) -> Dynamic {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|value| rhai::serde::to_dynamic(value).ok())
            .unwrap_or(Dynamic::UNIT)
    }
}

pub(crate) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<VariablesApi>("Variables")
        .register_fn("get", |api: &mut VariablesApi, key: &str| {
            api.get(key).map(Dynamic::from).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("set", |api: &mut VariablesApi, key: &str, value: Dynamic| {
            api.set(key, to_text(&value));
        });

    engine
        .register_type_with_name::<ResponseApi>("Response")
        .register_get("code", |r: &mut ResponseApi| r.code)
        .register_get("status", |r: &mut ResponseApi| r.status.clone())
        .register_get("headers", |r: &mut ResponseApi| r.headers_map())
        .register_fn("header", |r: &mut ResponseApi, name: &str| r.header(name))
        .register_fn("text", |r: &mut ResponseApi| r.body.clone())
        .register_fn("json", |r: &mut ResponseApi| r.json());
}
