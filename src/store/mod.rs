/// 存储协作方 - 工作区/环境/变量查询，响应与 body 持久化
mod file;
mod memory;

use async_trait::async_trait;

use crate::Result;
use crate::model::{Environment, NewResponse, NewVariable, Request, Response, Variable};

pub use file::FileStore;
pub use memory::MemoryStore;

/// 工作区、环境与变量的查询和修改
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn get_request(&self, request_id: &str) -> Result<Option<Request>>;

    async fn get_workspace_id_for_request(&self, request_id: &str) -> Result<Option<String>>;

    /// 工作区当前激活的环境（最多一个）
    async fn get_active_environment(&self, workspace_id: &str) -> Result<Option<Environment>>;

    async fn get_variables_by_environment(&self, environment_id: &str) -> Result<Vec<Variable>>;

    async fn update_variable(&self, variable_id: &str, value: &str) -> Result<Variable>;

    async fn create_variable(&self, variable: NewVariable) -> Result<Variable>;
}

/// 响应 body 存储
#[async_trait]
pub trait BodyStore: Send + Sync {
    /// 保存 body，返回存储位置
    async fn save_response_body(&self, response_id: &str, body: &str) -> Result<String>;

    /// 删除 body，不存在时不报错
    async fn delete_response_body(&self, response_id: &str) -> Result<()>;
}

/// 响应元数据存储
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// 写入响应记录，由存储分配时间戳
    async fn create_response(&self, response: NewResponse) -> Result<Response>;
}
