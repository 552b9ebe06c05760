use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::http::transport::{HttpTransport, TransportError};
use crate::model::{BodyParam, Header, Request, RequestAuth, RequestBody, TransportResponse};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 基于 reqwest 的传输实现
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    max_body_bytes: Option<usize>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rupost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Configuration(e.to_string()))?;

        Ok(Self {
            inner,
            max_body_bytes: None,
        })
    }

    /// 响应 body 超过上限时按传输失败处理
    pub fn with_max_body_bytes(mut self, max_body_bytes: Option<usize>) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn build(&self, request: &Request) -> Result<reqwest::RequestBuilder, String> {
        let url = reqwest::Url::parse(request.url.trim())
            .map_err(|e| format!("Invalid URL '{}': {}", request.url, e))?;

        let headers = build_headers(&request.headers)?;
        let has_content_type = headers.contains_key(CONTENT_TYPE);

        let mut req = self
            .inner
            .request(request.method.to_reqwest(), url)
            .headers(headers);

        req = match &request.body {
            RequestBody::None => req,
            RequestBody::Raw { text } => req.body(text.clone()),
            RequestBody::Json { text } => {
                with_default_content_type(req, has_content_type, "application/json")
                    .body(text.clone())
            }
            RequestBody::FormUrlencoded { params } => with_default_content_type(
                req,
                has_content_type,
                "application/x-www-form-urlencoded",
            )
            .body(encode_form(params)),
            RequestBody::FormData { params } => {
                let form = enabled(params).fold(reqwest::multipart::Form::new(), |form, p| {
                    form.text(p.name.clone(), p.value.clone())
                });
                req.multipart(form)
            }
            RequestBody::Graphql { query, variables } => {
                let payload = graphql_payload(query, variables)?;
                with_default_content_type(req, has_content_type, "application/json").body(payload)
            }
        };

        req = match &request.auth {
            RequestAuth::None => req,
            RequestAuth::Bearer { token } => req.bearer_auth(token),
            RequestAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
        };

        Ok(req)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send_request(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        let req = match self.build(request) {
            Ok(req) => req,
            Err(message) => return Ok(TransportResponse::network_failure(message, 0)),
        };

        debug!(method = %request.method, url = %request.url, "Sending request");

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(TransportResponse::network_failure(
                    describe_error(&e),
                    elapsed_ms(start),
                ));
            }
        };

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| Header::new(name.as_str(), v))
            })
            .collect();

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(TransportResponse::network_failure(
                    describe_error(&e),
                    elapsed_ms(start),
                ));
            }
        };
        let elapsed_time = elapsed_ms(start);

        if let Some(max) = self.max_body_bytes
            && bytes.len() > max
        {
            return Ok(TransportResponse::network_failure(
                format!("Response body too large (> {} bytes)", max),
                elapsed_time,
            ));
        }

        Ok(TransportResponse {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            elapsed_time,
        })
    }
}

fn enabled(params: &[BodyParam]) -> impl Iterator<Item = &BodyParam> {
    params.iter().filter(|p| p.enabled)
}

fn build_headers(headers: &[Header]) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for header in headers.iter().filter(|h| h.enabled && !h.name.trim().is_empty()) {
        let name = HeaderName::from_bytes(header.name.trim().as_bytes())
            .map_err(|e| format!("Invalid header name '{}': {}", header.name, e))?;
        let value = HeaderValue::from_str(&header.value)
            .map_err(|e| format!("Invalid value for header '{}': {}", header.name, e))?;
        map.append(name, value);
    }
    Ok(map)
}

fn with_default_content_type(
    req: reqwest::RequestBuilder,
    has_content_type: bool,
    content_type: &'static str,
) -> reqwest::RequestBuilder {
    if has_content_type {
        req
    } else {
        req.header(CONTENT_TYPE, content_type)
    }
}

fn encode_form(params: &[BodyParam]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for p in enabled(params) {
        serializer.append_pair(&p.name, &p.value);
    }
    serializer.finish()
}

/// GraphQL 请求体 `{query, variables}`，variables 为空时为 `{}`
fn graphql_payload(query: &str, variables: &str) -> Result<String, String> {
    let variables = if variables.trim().is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(variables).map_err(|e| format!("Invalid GraphQL variables: {}", e))?
    };

    Ok(serde_json::json!({ "query": query, "variables": variables }).to_string())
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request timed out: {}", e)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        format!("Network error: {}", e)
    }
}
