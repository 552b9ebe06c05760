use serde::{Deserialize, Serialize};

use crate::assertion::Assertion;
use crate::http::types::Method;

fn default_enabled() -> bool {
    true
}

/// 请求/响应头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub name: String,
    pub value: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 由引擎计算取值的头（目前只有 Host）
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_auto: bool,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
            is_auto: false,
        }
    }

    /// 创建自动计算的头
    pub fn auto(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            is_auto: true,
            ..Self::new(name, value)
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// 表单参数（form-urlencoded / form-data）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyParam {
    pub name: String,
    pub value: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl BodyParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// 请求体
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RequestBody {
    #[default]
    None,
    Raw {
        text: String,
    },
    Json {
        text: String,
    },
    FormUrlencoded {
        #[serde(default)]
        params: Vec<BodyParam>,
    },
    FormData {
        #[serde(default)]
        params: Vec<BodyParam>,
    },
    Graphql {
        query: String,
        #[serde(default)]
        variables: String,
    },
}

/// 认证方式
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestAuth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        #[serde(default)]
        password: String,
    },
}

/// 存储的请求定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub method: Method,

    pub url: String,

    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(default)]
    pub body: RequestBody,

    #[serde(default)]
    pub auth: RequestAuth,

    #[serde(default)]
    pub assertions: Vec<Assertion>,

    #[serde(default)]
    pub pre_request_script: Option<String>,

    #[serde(default)]
    pub post_request_script: Option<String>,
}

impl Request {
    pub fn new(id: impl Into<String>, method: Method, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::None,
            auth: RequestAuth::None,
            assertions: Vec::new(),
            pre_request_script: None,
            post_request_script: None,
        }
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_auth(mut self, auth: RequestAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_pre_request_script(mut self, script: impl Into<String>) -> Self {
        self.pre_request_script = Some(script.into());
        self
    }

    pub fn with_post_request_script(mut self, script: impl Into<String>) -> Self {
        self.post_request_script = Some(script.into());
        self
    }

    /// 查找（大小写不敏感）第一个同名的头
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialize_defaults() {
        let json = r#"{"_id": "req_1", "url": "http://example.com"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, "req_1");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.body, RequestBody::None);
        assert_eq!(request.auth, RequestAuth::None);
        assert!(request.assertions.is_empty());
    }

    #[test]
    fn test_request_body_tagged() {
        let json = r#"{"type": "form-urlencoded", "params": [{"name": "a", "value": "1"}]}"#;
        let body: RequestBody = serde_json::from_str(json).unwrap();
        match body {
            RequestBody::FormUrlencoded { params } => {
                assert_eq!(params.len(), 1);
                assert!(params[0].enabled);
            }
            other => panic!("unexpected body: {:?}", other),
        }

        let json = r#"{"type": "graphql", "query": "{ me { id } }"}"#;
        let body: RequestBody = serde_json::from_str(json).unwrap();
        assert_eq!(
            body,
            RequestBody::Graphql {
                query: "{ me { id } }".to_string(),
                variables: String::new()
            }
        );
    }

    #[test]
    fn test_header_is_auto_flag() {
        let json = r#"{"name": "Host", "value": "", "isAuto": true}"#;
        let header: Header = serde_json::from_str(json).unwrap();
        assert!(header.is_auto);
        assert!(header.enabled);
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let request = Request::new("r", Method::Get, "http://example.com")
            .with_header(Header::new("Content-Type", "application/json"));
        assert!(request.header("content-type").is_some());
        assert!(request.header("accept").is_none());
    }
}
