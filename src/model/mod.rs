/// 请求/响应/变量数据模型
mod request;
mod response;
mod variable;

pub use request::{BodyParam, Header, Request, RequestAuth, RequestBody};
pub use response::{NewResponse, Response, TransportResponse};
pub use variable::{Environment, NewVariable, PendingVariableUpdates, Variable, VariableContext};
