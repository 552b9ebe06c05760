use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 断言错误类型
///
/// 单个断言的错误只会记录到该断言的结果中，不会中断整批断言
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssertError {
    #[error("Unknown assertion source: {0}")]
    UnknownSource(String),

    #[error("Unknown assertion operator: {0}")]
    UnknownOperator(String),

    #[error("JSON path is required for jsonBody assertions")]
    PathRequired,

    #[error("Invalid JSON path '{path}': {message}")]
    InvalidJsonPath { path: String, message: String },

    #[error("Response body is not valid JSON: {0}")]
    BodyNotJson(String),

    #[error("Operator {operator} requires string values, got {actual}")]
    TypeMismatch { operator: Operator, actual: String },
}

/// 断言取值来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssertionSource {
    /// HTTP 状态码
    Status,
    /// 响应 Header（property 为头名称）
    Header,
    /// JSON Body（property 为 JSONPath 表达式）
    JsonBody,
    /// 响应时间（毫秒）
    ResponseTime,
    /// 无法识别的来源，求值时记为失败
    Unknown(String),
}

impl AssertionSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::Header => "header",
            Self::JsonBody => "jsonBody",
            Self::ResponseTime => "responseTime",
            Self::Unknown(s) => s,
        }
    }

    /// 数值型来源，比较值会先转换为数字
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Status | Self::ResponseTime)
    }
}

impl From<String> for AssertionSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "status" => Self::Status,
            "header" => Self::Header,
            "jsonBody" => Self::JsonBody,
            "responseTime" => Self::ResponseTime,
            _ => Self::Unknown(s),
        }
    }
}

impl From<AssertionSource> for String {
    fn from(source: AssertionSource) -> Self {
        source.as_str().to_string()
    }
}

impl FromStr for AssertionSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for AssertionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 比较运算符
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
    IsNull,
    IsNotNull,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::Exists => "exists",
            Self::NotExists => "notExists",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
            Self::Unknown(s) => s,
        }
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "equals" => Self::Equals,
            "notEquals" => Self::NotEquals,
            "contains" => Self::Contains,
            "notContains" => Self::NotContains,
            "greaterThan" => Self::GreaterThan,
            "lessThan" => Self::LessThan,
            "exists" => Self::Exists,
            "notExists" => Self::NotExists,
            "isNull" => Self::IsNull,
            "isNotNull" => Self::IsNotNull,
            _ => Self::Unknown(s),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl FromStr for Operator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_enabled() -> bool {
    true
}

/// 比较值允许写成字符串、数字或布尔，统一保存为字符串
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// 请求上声明的断言，只在发送时求值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub id: String,
    pub source: AssertionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub operator: Operator,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Assertion {
    pub fn new(
        id: impl Into<String>,
        source: AssertionSource,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            property: None,
            operator,
            value: value.into(),
            enabled: true,
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(property) = &self.property {
            write!(f, "[{}]", property)?;
        }
        write!(f, " {}", self.operator)?;
        if !self.value.is_empty() {
            write!(f, " {}", self.value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionStatus {
    Pass,
    Fail,
}

/// 单个断言结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub assertion_id: String,
    pub status: AssertionStatus,

    /// 实际值，None 表示未定义
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssertionResult {
    /// 创建成功的断言结果
    pub fn pass(assertion_id: String, actual: Option<Value>, expected: Option<Value>) -> Self {
        Self {
            assertion_id,
            status: AssertionStatus::Pass,
            actual_value: actual,
            expected_value: expected,
            error: None,
        }
    }

    /// 创建失败的断言结果
    pub fn fail(assertion_id: String, actual: Option<Value>, expected: Option<Value>) -> Self {
        Self {
            assertion_id,
            status: AssertionStatus::Fail,
            actual_value: actual,
            expected_value: expected,
            error: None,
        }
    }

    /// 创建错误的断言结果（求值过程出错）
    pub fn error(assertion_id: String, expected: Option<Value>, error: AssertError) -> Self {
        Self {
            assertion_id,
            status: AssertionStatus::Fail,
            actual_value: None,
            expected_value: expected,
            error: Some(error.to_string()),
        }
    }

    pub fn with_error(mut self, error: AssertError) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn passed(&self) -> bool {
        self.status == AssertionStatus::Pass
    }
}

/// 一次执行的断言汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<AssertionResult>,
}

impl TestResult {
    pub fn from_results(results: Vec<AssertionResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: results.len() - passed,
            total: results.len(),
            results,
        }
    }
}
