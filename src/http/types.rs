use std::fmt;
use std::str::FromStr;

use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl FromStr for Method {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(EngineError::Other(format!("Invalid HTTP method: {}", s))),
        }
    }
}

impl Method {
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 计算 URL 的 Host 头取值（host[:port]，默认端口省略）
///
/// URL 无法解析或没有 host 时返回 None
pub fn host_header_value(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("get").unwrap(), Method::Get);
        assert_eq!(Method::parse("PATCH").unwrap(), Method::Patch);
        assert!(Method::parse("FETCH").is_err());
    }

    #[test]
    fn test_method_serde_uppercase() {
        let json = serde_json::to_string(&Method::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
        let method: Method = serde_json::from_str("\"OPTIONS\"").unwrap();
        assert_eq!(method, Method::Options);
    }

    #[test]
    fn test_host_header_value_default_port() {
        assert_eq!(
            host_header_value("http://example.com/api"),
            Some("example.com".to_string())
        );
        assert_eq!(
            host_header_value("https://example.com:443/api"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_host_header_value_explicit_port() {
        assert_eq!(
            host_header_value("http://localhost:3000/users"),
            Some("localhost:3000".to_string())
        );
    }

    #[test]
    fn test_host_header_value_unparsable() {
        assert_eq!(host_header_value("{{base_url}}/users"), None);
        assert_eq!(host_header_value("example.com/api"), None);
    }
}
