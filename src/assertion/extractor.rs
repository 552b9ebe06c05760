use serde_json::Value;
use serde_json_path::JsonPath;

use crate::assertion::types::{AssertError, Assertion, AssertionSource};
use crate::model::TransportResponse;

/// 断言批次开始前解析一次的响应 body
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    /// 非 JSON body，保存解析错误信息
    Absent(String),
}

impl ParsedBody {
    pub fn parse(raw_body: &str) -> Self {
        match serde_json::from_str::<Value>(raw_body) {
            Ok(value) => ParsedBody::Json(value),
            Err(e) => ParsedBody::Absent(e.to_string()),
        }
    }
}

/// 从响应中提取实际值，Ok(None) 表示未定义
pub fn extract_value(
    assertion: &Assertion,
    response: &TransportResponse,
    body: &ParsedBody,
) -> Result<Option<Value>, AssertError> {
    match &assertion.source {
        AssertionSource::Status => Ok(Some(Value::from(response.status_code))),

        AssertionSource::Header => {
            let name = assertion.property.as_deref().unwrap_or_default();
            Ok(response.header(name).map(|v| Value::String(v.to_string())))
        }

        AssertionSource::JsonBody => {
            let path = assertion
                .property
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or(AssertError::PathRequired)?;
            match body {
                ParsedBody::Json(json) => query_json_path(json, path),
                ParsedBody::Absent(reason) => Err(AssertError::BodyNotJson(reason.clone())),
            }
        }

        AssertionSource::ResponseTime => Ok(Some(Value::from(response.elapsed_time))),

        AssertionSource::Unknown(name) => Err(AssertError::UnknownSource(name.clone())),
    }
}

/// 执行 JSONPath 查询
///
/// 单个匹配返回该值，多个匹配返回数组，没有匹配返回 None
fn query_json_path(json: &Value, path: &str) -> Result<Option<Value>, AssertError> {
    let json_path = JsonPath::parse(path.trim()).map_err(|e| AssertError::InvalidJsonPath {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    let nodes = json_path.query(json).all();
    Ok(match nodes.as_slice() {
        [] => None,
        [single] => Some((*single).clone()),
        many => Some(Value::Array(many.iter().map(|v| (*v).clone()).collect())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::types::Operator;

    fn create_test_response(status: u16, body: &str) -> TransportResponse {
        TransportResponse::new(status, "OK", body)
            .with_header("Content-Type", "application/json")
            .with_elapsed_time(123)
    }

    fn assertion(source: AssertionSource, property: Option<&str>) -> Assertion {
        let mut a = Assertion::new("a1", source, Operator::Exists, "");
        a.property = property.map(|p| p.to_string());
        a
    }

    #[test]
    fn test_extract_status() {
        let response = create_test_response(200, "{}");
        let body = ParsedBody::parse(&response.body);
        let value = extract_value(&assertion(AssertionSource::Status, None), &response, &body);
        assert_eq!(value, Ok(Some(Value::from(200))));
    }

    #[test]
    fn test_extract_header_case_insensitive() {
        let response = create_test_response(200, "{}");
        let body = ParsedBody::parse(&response.body);
        let value = extract_value(
            &assertion(AssertionSource::Header, Some("content-type")),
            &response,
            &body,
        );
        assert_eq!(value, Ok(Some(Value::from("application/json"))));
    }

    #[test]
    fn test_extract_header_missing_is_undefined() {
        let response = create_test_response(200, "{}");
        let body = ParsedBody::parse(&response.body);
        let value = extract_value(
            &assertion(AssertionSource::Header, Some("x-missing")),
            &response,
            &body,
        );
        assert_eq!(value, Ok(None));
    }

    #[test]
    fn test_extract_response_time() {
        let response = create_test_response(200, "{}");
        let body = ParsedBody::parse(&response.body);
        let value = extract_value(
            &assertion(AssertionSource::ResponseTime, None),
            &response,
            &body,
        );
        assert_eq!(value, Ok(Some(Value::from(123))));
    }

    #[test]
    fn test_extract_json_path() {
        let response = create_test_response(200, r#"{"user": {"roles": ["admin", "user"]}}"#);
        let body = ParsedBody::parse(&response.body);

        let first = extract_value(
            &assertion(AssertionSource::JsonBody, Some("$.user.roles[0]")),
            &response,
            &body,
        );
        assert_eq!(first, Ok(Some(Value::from("admin"))));

        let all = extract_value(
            &assertion(AssertionSource::JsonBody, Some("$.user.roles[*]")),
            &response,
            &body,
        );
        assert_eq!(all, Ok(Some(serde_json::json!(["admin", "user"]))));

        let missing = extract_value(
            &assertion(AssertionSource::JsonBody, Some("$.user.email")),
            &response,
            &body,
        );
        assert_eq!(missing, Ok(None));
    }

    #[test]
    fn test_extract_json_path_required() {
        let response = create_test_response(200, "{}");
        let body = ParsedBody::parse(&response.body);
        let value = extract_value(&assertion(AssertionSource::JsonBody, None), &response, &body);
        assert_eq!(value, Err(AssertError::PathRequired));
    }

    #[test]
    fn test_extract_from_non_json_body() {
        let response = create_test_response(200, "<html></html>");
        let body = ParsedBody::parse(&response.body);
        let value = extract_value(
            &assertion(AssertionSource::JsonBody, Some("$.id")),
            &response,
            &body,
        );
        assert!(matches!(value, Err(AssertError::BodyNotJson(_))));
    }

    #[test]
    fn test_extract_invalid_json_path() {
        let response = create_test_response(200, "{}");
        let body = ParsedBody::parse(&response.body);
        let value = extract_value(
            &assertion(AssertionSource::JsonBody, Some("$[?")),
            &response,
            &body,
        );
        assert!(matches!(value, Err(AssertError::InvalidJsonPath { .. })));
    }
}
