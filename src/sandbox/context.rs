use rhai::{Dynamic, Scope};
use std::collections::BTreeMap;

/// 传入沙箱的上下文对象
///
/// 执行前每个顶层 key 作为脚本变量注入，执行后再逐个读回，
/// 因此脚本对这些变量的重新赋值对调用方可见。
/// 能力对象（如 `environment`）内部共享状态，方法调用产生的修改同样可见。
#[derive(Debug, Clone, Default)]
pub struct ScriptContext {
    entries: BTreeMap<String, Dynamic>,
}

impl ScriptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入任意可注册类型的值
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Dynamic::from(value));
    }

    pub fn with<T: Clone + Send + Sync + 'static>(
        mut self,
        key: impl Into<String>,
        value: T,
    ) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Dynamic> {
        self.entries.get(key)
    }

    /// 按类型读取值，类型不匹配时返回 None
    pub fn get_as<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(|v| v.clone().try_cast::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push_into(&self, scope: &mut Scope<'_>) {
        for (key, value) in &self.entries {
            scope.push_dynamic(key.as_str(), value.clone());
        }
    }

    /// 从脚本作用域读回所有顶层 key
    pub(crate) fn copy_back(&mut self, scope: &Scope<'_>) {
        for (key, value) in self.entries.iter_mut() {
            if let Some(updated) = scope.get_value::<Dynamic>(key) {
                *value = updated;
            }
        }
    }
}
