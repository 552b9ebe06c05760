use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assertion::TestResult;
use crate::model::Header;

/// 传输层返回的响应（持久化之前）
///
/// status_code 为 0 表示传输失败，此时 status_message 携带失败原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportResponse {
    pub status_code: u16,
    pub status_message: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
    /// 耗时（毫秒）
    pub elapsed_time: u64,
}

impl TransportResponse {
    pub fn new(
        status_code: u16,
        status_message: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
            headers: Vec::new(),
            body: body.into(),
            elapsed_time: 0,
        }
    }

    /// 网络错误、超时等传输失败编码为 status 0 的响应
    pub fn network_failure(message: impl Into<String>, elapsed_time: u64) -> Self {
        Self {
            status_code: 0,
            status_message: message.into(),
            headers: Vec::new(),
            body: String::new(),
            elapsed_time,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_elapsed_time(mut self, elapsed_time: u64) -> Self {
        self.elapsed_time = elapsed_time;
        self
    }

    pub fn is_network_failure(&self) -> bool {
        self.status_code == 0
    }

    /// 大小写不敏感的头查找
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// 待持久化的响应元数据（不含 body）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub request_id: String,
    pub status_code: u16,
    pub status_message: String,
    pub headers: Vec<Header>,
    pub elapsed_time: u64,
    /// body 存储位置
    pub body_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestResult>,
}

/// 持久化后的响应记录
///
/// 存储中的记录 body 为空；执行器返回时会把内存中的 body 合并回来
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(rename = "_id")]
    pub id: String,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
    pub status_code: u16,
    pub status_message: String,
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing)]
    pub body: String,
    pub body_path: String,
    pub elapsed_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestResult>,
}

impl Response {
    /// 由存储调用：分配时间戳
    pub fn from_new(new: NewResponse, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            request_id: new.request_id,
            created_at,
            status_code: new.status_code,
            status_message: new.status_message,
            headers: new.headers,
            body: String::new(),
            body_path: new.body_path,
            elapsed_time: new.elapsed_time,
            test_results: new.test_results,
        }
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    pub fn is_network_failure(&self) -> bool {
        self.status_code == 0
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }

    pub fn is_client_error(&self) -> bool {
        (400..=499).contains(&self.status_code)
    }

    /// 断言是否全部通过（没有断言也算通过）
    pub fn assertions_passed(&self) -> bool {
        self.test_results.as_ref().is_none_or(|r| r.failed == 0)
    }
}
