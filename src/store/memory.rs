use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::model::{Environment, NewResponse, NewVariable, Request, Response, Variable};
use crate::store::{BodyStore, ResponseStore, WorkspaceStore};
use crate::{EngineError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    requests: HashMap<String, Request>,
    request_workspaces: HashMap<String, String>,
    environments: Vec<Environment>,
    variables: Vec<Variable>,
    responses: Vec<Response>,
    bodies: HashMap<String, String>,
}

/// 内存存储
///
/// 同一环境内变量 key 唯一；每个工作区最多一个激活环境。
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 把请求登记到工作区下
    pub fn add_request(&self, workspace_id: impl Into<String>, request: Request) {
        let mut state = self.lock();
        state
            .request_workspaces
            .insert(request.id.clone(), workspace_id.into());
        state.requests.insert(request.id.clone(), request);
    }

    /// 登记一个不属于任何工作区的请求
    pub fn add_orphan_request(&self, request: Request) {
        self.lock().requests.insert(request.id.clone(), request);
    }

    /// 创建环境，`active` 为 true 时同工作区其他环境被取消激活
    pub fn add_environment(
        &self,
        workspace_id: impl Into<String>,
        name: impl Into<String>,
        active: bool,
    ) -> Environment {
        let environment = Environment {
            id: generate_id("env"),
            workspace_id: workspace_id.into(),
            name: name.into(),
            is_active: false,
        };
        self.lock().environments.push(environment.clone());

        if active {
            // 刚插入的环境一定存在
            self.activate_environment(&environment.id).unwrap_or(environment)
        } else {
            environment
        }
    }

    /// 激活环境
    pub fn activate_environment(&self, environment_id: &str) -> Result<Environment> {
        let mut state = self.lock();
        let workspace_id = state
            .environments
            .iter()
            .find(|e| e.id == environment_id)
            .map(|e| e.workspace_id.clone())
            .ok_or_else(|| EngineError::store(format!("环境不存在: {}", environment_id)))?;

        let mut activated = None;
        for env in state
            .environments
            .iter_mut()
            .filter(|e| e.workspace_id == workspace_id)
        {
            env.is_active = env.id == environment_id;
            if env.is_active {
                activated = Some(env.clone());
            }
        }

        activated.ok_or_else(|| EngineError::store(format!("环境不存在: {}", environment_id)))
    }

    /// 直接添加变量（同步版本的 create_variable）
    pub fn add_variable(
        &self,
        environment_id: &str,
        key: impl Into<String>,
        value: impl Into<String>,
        is_secret: bool,
    ) -> Result<Variable> {
        self.insert_variable(NewVariable {
            environment_id: environment_id.to_string(),
            key: key.into(),
            value: value.into(),
            is_secret,
        })
    }

    fn insert_variable(&self, new: NewVariable) -> Result<Variable> {
        let mut state = self.lock();
        if !state.environments.iter().any(|e| e.id == new.environment_id) {
            return Err(EngineError::store(format!(
                "环境不存在: {}",
                new.environment_id
            )));
        }
        if state
            .variables
            .iter()
            .any(|v| v.environment_id == new.environment_id && v.key == new.key)
        {
            return Err(EngineError::store(format!(
                "变量已存在: {} (环境 {})",
                new.key, new.environment_id
            )));
        }

        let variable = Variable {
            id: generate_id("var"),
            environment_id: new.environment_id,
            key: new.key,
            value: new.value,
            is_secret: new.is_secret,
        };
        state.variables.push(variable.clone());
        Ok(variable)
    }

    /// 已持久化的响应（按写入顺序）
    pub fn responses(&self) -> Vec<Response> {
        self.lock().responses.clone()
    }

    pub fn body(&self, response_id: &str) -> Option<String> {
        self.lock().bodies.get(response_id).cloned()
    }

    /// 环境下的全部变量
    pub fn variables(&self, environment_id: &str) -> Vec<Variable> {
        self.lock()
            .variables
            .iter()
            .filter(|v| v.environment_id == environment_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WorkspaceStore for MemoryStore {
    async fn get_request(&self, request_id: &str) -> Result<Option<Request>> {
        Ok(self.lock().requests.get(request_id).cloned())
    }

    async fn get_workspace_id_for_request(&self, request_id: &str) -> Result<Option<String>> {
        Ok(self.lock().request_workspaces.get(request_id).cloned())
    }

    async fn get_active_environment(&self, workspace_id: &str) -> Result<Option<Environment>> {
        Ok(self
            .lock()
            .environments
            .iter()
            .find(|e| e.workspace_id == workspace_id && e.is_active)
            .cloned())
    }

    async fn get_variables_by_environment(&self, environment_id: &str) -> Result<Vec<Variable>> {
        Ok(self.variables(environment_id))
    }

    async fn update_variable(&self, variable_id: &str, value: &str) -> Result<Variable> {
        let mut state = self.lock();
        let variable = state
            .variables
            .iter_mut()
            .find(|v| v.id == variable_id)
            .ok_or_else(|| EngineError::store(format!("变量不存在: {}", variable_id)))?;
        variable.value = value.to_string();
        Ok(variable.clone())
    }

    async fn create_variable(&self, variable: NewVariable) -> Result<Variable> {
        self.insert_variable(variable)
    }
}

#[async_trait]
impl BodyStore for MemoryStore {
    async fn save_response_body(&self, response_id: &str, body: &str) -> Result<String> {
        self.lock()
            .bodies
            .insert(response_id.to_string(), body.to_string());
        Ok(format!("memory://bodies/{}", response_id))
    }

    async fn delete_response_body(&self, response_id: &str) -> Result<()> {
        self.lock().bodies.remove(response_id);
        Ok(())
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn create_response(&self, response: NewResponse) -> Result<Response> {
        let record = Response::from_new(response, Utc::now());
        self.lock().responses.push(record.clone());
        Ok(record)
    }
}
