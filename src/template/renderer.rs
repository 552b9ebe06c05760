use crate::model::{
    BodyParam, Header, Request, RequestAuth, RequestBody, Variable, VariableContext,
};
use crate::template::TemplateError;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::warn;

/// 模板渲染器，替换 `{{ name }}` 占位符
pub struct TemplateEngine;

impl TemplateEngine {
    /// 渲染单个字符串
    ///
    /// 模板格式错误时记录警告并原样返回输入，不会向调用方报错
    pub fn render(template: &str, context: &VariableContext) -> String {
        match Self::try_render(template, context) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "Failed to render template, keeping original text");
                template.to_string()
            }
        }
    }

    /// 渲染单个字符串，格式错误时返回 TemplateError
    ///
    /// 未定义的变量保持占位符原样
    pub fn try_render(template: &str, context: &VariableContext) -> Result<String, TemplateError> {
        if !template.contains("{{") {
            return Ok(template.to_string());
        }

        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            output.push_str(&template[last..whole.start()]);
            output.push_str(&Self::substitute(&caps, context)?);
            last = whole.end();
        }

        let rest = &template[last..];
        if let Some(pos) = rest.find("{{") {
            return Err(TemplateError::Unclosed {
                position: last + pos,
            });
        }
        output.push_str(rest);

        Ok(output)
    }

    fn substitute(caps: &Captures, context: &VariableContext) -> Result<String, TemplateError> {
        let expression = &caps[1];
        let name = expression.trim();
        if !name_regex().is_match(name) {
            return Err(TemplateError::InvalidExpression(expression.to_string()));
        }

        Ok(context.get(name).unwrap_or(&caps[0]).to_string())
    }

    /// 渲染整个请求，返回深拷贝；输入请求不会被修改
    ///
    /// 每个字段独立渲染，某个字段失败不影响其他字段
    pub fn render_request(request: &Request, variables: &[Variable]) -> Request {
        let context = VariableContext::from_variables(variables);
        let render = |text: &str| Self::render(text, &context);

        let mut rendered = request.clone();
        rendered.url = render(&request.url);
        rendered.headers = request
            .headers
            .iter()
            .map(|h| Header {
                name: render(&h.name),
                value: render(&h.value),
                ..h.clone()
            })
            .collect();

        let render_params = |params: &[BodyParam]| -> Vec<BodyParam> {
            params
                .iter()
                .map(|p| BodyParam {
                    name: render(&p.name),
                    value: render(&p.value),
                    enabled: p.enabled,
                })
                .collect()
        };

        rendered.body = match &request.body {
            RequestBody::None => RequestBody::None,
            RequestBody::Raw { text } => RequestBody::Raw { text: render(text) },
            RequestBody::Json { text } => RequestBody::Json { text: render(text) },
            RequestBody::FormUrlencoded { params } => RequestBody::FormUrlencoded {
                params: render_params(params),
            },
            RequestBody::FormData { params } => RequestBody::FormData {
                params: render_params(params),
            },
            RequestBody::Graphql { query, variables } => RequestBody::Graphql {
                query: render(query),
                variables: render(variables),
            },
        };

        rendered.auth = match &request.auth {
            RequestAuth::None => RequestAuth::None,
            RequestAuth::Bearer { token } => RequestAuth::Bearer {
                token: render(token),
            },
            RequestAuth::Basic { username, password } => RequestAuth::Basic {
                username: render(username),
                password: render(password),
            },
        };

        rendered
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap())
}

fn name_regex() -> &'static Regex {
    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    NAME_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Method;

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
    fn test_render_simple() {
        let mut ctx = VariableContext::new();
        ctx.insert("base_url", "http://localhost:8080");

        let output = TemplateEngine::render("{{base_url}}/api/users", &ctx);
        assert_eq!(output, "http://localhost:8080/api/users");
    }

    #[test]
    fn test_render_whitespace_inside_braces() {
        let mut ctx = VariableContext::new();
        ctx.insert("host", "example.com");
        ctx.insert("port", "8080");

        let output = TemplateEngine::render("https://{{ host }}:{{port }}/users", &ctx);
        assert_eq!(output, "https://example.com:8080/users");
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let ctx = VariableContext::new();
        assert_eq!(TemplateEngine::render("plain text", &ctx), "plain text");
        assert_eq!(TemplateEngine::render("", &ctx), "");
    }

    #[test]
    fn test_render_missing_variable_kept() {
        let ctx = VariableContext::new();
        // 未找到的变量保持原样
        assert_eq!(TemplateEngine::render("{{missing}}/path", &ctx), "{{missing}}/path");
    }

    #[test]
    fn test_render_malformed_returns_original() {
        let mut ctx = VariableContext::new();
        ctx.insert("a", "1");

        let unclosed = "{{a}} and {{ broken";
        assert!(matches!(
            TemplateEngine::try_render(unclosed, &ctx),
            Err(TemplateError::Unclosed { position: 10 })
        ));
        assert_eq!(TemplateEngine::render(unclosed, &ctx), unclosed);

        let invalid = "value: {{ 1 + 2 }}";
        assert!(matches!(
            TemplateEngine::try_render(invalid, &ctx),
            Err(TemplateError::InvalidExpression(_))
        ));
        assert_eq!(TemplateEngine::render(invalid, &ctx), invalid);
    }

    #[test]
    fn test_render_request_all_leaves() {
        let vars = vec![
            variable("host", "api.example.com"),
            variable("token", "t-123"),
            variable("name", "alice"),
        ];
        let request = Request::new("req_1", Method::Post, "https://{{host}}/users")
            .with_header(Header::new("X-{{name}}", "{{token}}"))
            .with_body(RequestBody::Graphql {
                query: "query { user(name: \"{{name}}\") { id } }".to_string(),
                variables: r#"{"n": "{{name}}"}"#.to_string(),
            })
            .with_auth(RequestAuth::Bearer {
                token: "{{token}}".to_string(),
            });

        let rendered = TemplateEngine::render_request(&request, &vars);
        assert_eq!(rendered.url, "https://api.example.com/users");
        assert_eq!(rendered.headers[0].name, "X-alice");
        assert_eq!(rendered.headers[0].value, "t-123");
        assert_eq!(
            rendered.body,
            RequestBody::Graphql {
                query: "query { user(name: \"alice\") { id } }".to_string(),
                variables: r#"{"n": "alice"}"#.to_string(),
            }
        );
        assert_eq!(
            rendered.auth,
            RequestAuth::Bearer {
                token: "t-123".to_string()
            }
        );

        // 原请求不变
        assert_eq!(request.url, "https://{{host}}/users");
    }

    #[test]
    fn test_render_request_form_and_basic_auth() {
        let vars = vec![variable("user", "bob"), variable("pass", "s3cret")];
        let request = Request::new("req_2", Method::Post, "http://example.com")
            .with_body(RequestBody::FormUrlencoded {
                params: vec![BodyParam::new("{{user}}_field", "{{pass}}")],
            })
            .with_auth(RequestAuth::Basic {
                username: "{{user}}".to_string(),
                password: "{{pass}}".to_string(),
            });

        let rendered = TemplateEngine::render_request(&request, &vars);
        match rendered.body {
            RequestBody::FormUrlencoded { params } => {
                assert_eq!(params[0].name, "bob_field");
                assert_eq!(params[0].value, "s3cret");
            }
            other => panic!("unexpected body: {:?}", other),
        }
        assert_eq!(
            rendered.auth,
            RequestAuth::Basic {
                username: "bob".to_string(),
                password: "s3cret".to_string()
            }
        );
    }

    #[test]
    fn test_render_request_leaf_failure_is_isolated() {
        let vars = vec![variable("host", "example.com")];
        let request = Request::new("req_3", Method::Post, "http://{{host}}/x").with_body(
            RequestBody::Json {
                text: r#"{"broken": "{{ oops"}"#.to_string(),
            },
        );

        let rendered = TemplateEngine::render_request(&request, &vars);
        assert_eq!(rendered.url, "http://example.com/x");
        assert_eq!(
            rendered.body,
            RequestBody::Json {
                text: r#"{"broken": "{{ oops"}"#.to_string()
            }
        );
    }
}
