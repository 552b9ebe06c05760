use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 环境变量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(rename = "_id")]
    pub id: String,
    pub environment_id: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub is_secret: bool,
}

/// 创建变量的参数（由存储分配 id）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVariable {
    pub environment_id: String,
    pub key: String,
    pub value: String,
    pub is_secret: bool,
}

/// 工作区下的命名环境，每个工作区最多一个处于激活状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(rename = "_id")]
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

/// 变量上下文，模板渲染使用的扁平映射
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// 变量映射表
    variables: HashMap<String, String>,
}

impl VariableContext {
    /// 创建新的空变量上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 从变量列表构建，重复 key 时后出现的覆盖先出现的
    pub fn from_variables(variables: &[Variable]) -> Self {
        let mut context = Self::new();
        for variable in variables {
            context.insert(variable.key.clone(), variable.value.clone());
        }
        context
    }

    /// 插入变量
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// 获取变量值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|s| s.as_str())
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// 一次脚本调用期间累积的变量写入
///
/// 同一 key 多次写入只保留最后的值，位置按首次写入的顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingVariableUpdates {
    entries: Vec<(String, String)>,
}

impl PendingVariableUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl IntoIterator for PendingVariableUpdates {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(key: &str, value: &str) -> Variable {
        Variable {
            id: format!("var_{}", key),
            environment_id: "env_1".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            is_secret: false,
        }
    }

    #[test]
    fn test_variable_context_basic() {
        let mut ctx = VariableContext::new();
        assert!(ctx.is_empty());

        ctx.insert("key", "value");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("key"), Some("value"));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn test_context_later_entries_win() {
        let vars = vec![variable("host", "a.com"), variable("host", "b.com")];
        let ctx = VariableContext::from_variables(&vars);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("host"), Some("b.com"));
    }

    #[test]
    fn test_pending_updates_last_write_wins() {
        let mut pending = PendingVariableUpdates::new();
        pending.set("a", "1");
        pending.set("b", "2");
        pending.set("a", "3");

        assert_eq!(pending.len(), 2);
        assert_eq!(pending.get("a"), Some("3"));
        let keys: Vec<_> = pending.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
