use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assertion::{TestResult, run_assertions};
use crate::http::{HttpTransport, host_header_value};
use crate::model::{
    Environment, NewResponse, NewVariable, PendingVariableUpdates, Request, Response,
    TransportResponse, Variable,
};
use crate::runner::PipelineStage;
use crate::sandbox::{ResponseApi, ScriptContext, ScriptSandbox, VariablesApi};
use crate::store::{BodyStore, ResponseStore, WorkspaceStore};
use crate::template::TemplateEngine;
use crate::{EngineError, Result};

/// 解析得到的执行上下文
#[derive(Debug, Default)]
struct ResolvedContext {
    environment: Option<Environment>,
    variables: Vec<Variable>,
}

/// 请求执行器
///
/// 按固定顺序执行：
/// resolve-context → pre-script → render → dispatch → post-script → flush → assert → persist。
/// 任一阶段失败都会终止整个流程，且不会持久化任何响应。
pub struct RequestExecutor {
    workspace: Arc<dyn WorkspaceStore>,
    transport: Arc<dyn HttpTransport>,
    bodies: Arc<dyn BodyStore>,
    responses: Arc<dyn ResponseStore>,
    sandbox: ScriptSandbox,
}

impl RequestExecutor {
    pub fn new(
        workspace: Arc<dyn WorkspaceStore>,
        transport: Arc<dyn HttpTransport>,
        bodies: Arc<dyn BodyStore>,
        responses: Arc<dyn ResponseStore>,
    ) -> Self {
        Self {
            workspace,
            transport,
            bodies,
            responses,
            sandbox: ScriptSandbox::new(),
        }
    }

    pub fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.sandbox = self.sandbox.with_timeout(timeout);
        self
    }

    /// 按 id 查找请求并执行
    pub async fn execute_by_id(&self, request_id: &str) -> Result<Response> {
        let request = self
            .workspace
            .get_request(request_id)
            .await?
            .ok_or_else(|| EngineError::RequestNotFound(request_id.to_string()))?;
        self.execute(&request).await
    }

    /// 执行请求，返回已持久化并合并了 body 的响应
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        let started = Instant::now();
        let request_id = request.id.as_str();

        trace_stage(request_id, PipelineStage::ResolveContext);
        let ResolvedContext {
            environment,
            mut variables,
        } = self.resolve_context(request_id).await?;

        if let Some(env) = &environment
            && let Some(script) = script_text(&request.pre_request_script)
        {
            trace_stage(request_id, PipelineStage::PreScript);
            let pending = self
                .run_script(PipelineStage::PreScript, script, &variables, None)
                .await?;
            self.flush(request_id, env, &mut variables, pending).await?;
        }

        trace_stage(request_id, PipelineStage::Render);
        let mut rendered = TemplateEngine::render_request(request, &variables);
        recompute_auto_host(&mut rendered);

        trace_stage(request_id, PipelineStage::Dispatch);
        let response = self.transport.send_request(&rendered).await?;
        if response.is_network_failure() {
            debug!(request_id, message = %response.status_message, "Transport failure");
        }

        if let Some(env) = &environment
            && let Some(script) = script_text(&request.post_request_script)
        {
            trace_stage(request_id, PipelineStage::PostScript);
            let pending = self
                .run_script(PipelineStage::PostScript, script, &variables, Some(&response))
                .await?;
            self.flush(request_id, env, &mut variables, pending).await?;
        }

        let test_results = if request.assertions.is_empty() {
            None
        } else {
            trace_stage(request_id, PipelineStage::Assert);
            Some(run_assertions(&request.assertions, &response, &response.body))
        };

        trace_stage(request_id, PipelineStage::Persist);
        let record = self.persist(request_id, response, test_results).await?;

        trace_stage(request_id, PipelineStage::Done);
        info!(
            request_id,
            status_code = record.status_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request executed"
        );
        Ok(record)
    }

    /// 没有工作区或激活环境时返回空上下文
    async fn resolve_context(&self, request_id: &str) -> Result<ResolvedContext> {
        let Some(workspace_id) = self.workspace.get_workspace_id_for_request(request_id).await?
        else {
            debug!(request_id, "Request has no workspace");
            return Ok(ResolvedContext::default());
        };

        let Some(environment) = self.workspace.get_active_environment(&workspace_id).await? else {
            debug!(request_id, workspace_id = %workspace_id, "Workspace has no active environment");
            return Ok(ResolvedContext::default());
        };

        let variables = self
            .workspace
            .get_variables_by_environment(&environment.id)
            .await?;
        debug!(
            request_id,
            environment = %environment.name,
            variables = variables.len(),
            "Resolved environment"
        );

        Ok(ResolvedContext {
            environment: Some(environment),
            variables,
        })
    }

    async fn run_script(
        &self,
        stage: PipelineStage,
        script: &str,
        variables: &[Variable],
        response: Option<&TransportResponse>,
    ) -> Result<PendingVariableUpdates> {
        let api = VariablesApi::new(variables);
        let mut context = ScriptContext::new()
            .with("environment", api.clone())
            .with("variables", api.clone());
        if let Some(response) = response {
            context.insert("response", ResponseApi::new(response));
        }

        let secrets = variables
            .iter()
            .filter(|v| v.is_secret && !v.value.is_empty())
            .map(|v| v.value.clone());
        self.sandbox
            .clone()
            .with_secrets(secrets)
            .execute(script, context)
            .await
            .map_err(|e| EngineError::script(stage, e))?;

        Ok(api.take_pending())
    }

    /// 提交脚本的待写入变量
    ///
    /// 已存在的 key 更新存储和内存列表；未知 key 在激活环境下创建非机密变量
    async fn flush(
        &self,
        request_id: &str,
        environment: &Environment,
        variables: &mut Vec<Variable>,
        pending: PendingVariableUpdates,
    ) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        trace_stage(request_id, PipelineStage::Flush);

        for (key, value) in pending {
            // 与脚本中 get 的取值规则一致：重复 key 以靠后的为准
            match variables.iter_mut().rev().find(|v| v.key == key) {
                Some(existing) => {
                    let updated = self.workspace.update_variable(&existing.id, &value).await?;
                    *existing = updated;
                }
                None => {
                    let created = self
                        .workspace
                        .create_variable(NewVariable {
                            environment_id: environment.id.clone(),
                            key,
                            value,
                            is_secret: false,
                        })
                        .await?;
                    variables.push(created);
                }
            }
        }
        Ok(())
    }

    async fn persist(
        &self,
        request_id: &str,
        response: TransportResponse,
        test_results: Option<TestResult>,
    ) -> Result<Response> {
        let response_id = format!("res_{}", Uuid::new_v4().simple());
        let body_path = self
            .bodies
            .save_response_body(&response_id, &response.body)
            .await?;

        let TransportResponse {
            status_code,
            status_message,
            headers,
            body,
            elapsed_time,
        } = response;

        let created = self
            .responses
            .create_response(NewResponse {
                id: response_id.clone(),
                request_id: request_id.to_string(),
                status_code,
                status_message,
                headers,
                elapsed_time,
                body_path,
                test_results,
            })
            .await;

        match created {
            Ok(record) => Ok(record.with_body(body)),
            Err(e) => {
                // 记录写入失败时不留下孤立的 body
                if let Err(cleanup) = self.bodies.delete_response_body(&response_id).await {
                    warn!(
                        response_id = %response_id,
                        error = %cleanup,
                        "Failed to remove orphaned response body"
                    );
                }
                Err(e)
            }
        }
    }
}

fn trace_stage(request_id: &str, stage: PipelineStage) {
    debug!(request_id, stage = %stage, "Pipeline stage");
}

fn script_text(script: &Option<String>) -> Option<&str> {
    script.as_deref().filter(|s| !s.trim().is_empty())
}

/// 用渲染后的 URL 重新计算自动 Host 头；URL 无法解析时保持渲染结果
fn recompute_auto_host(request: &mut Request) {
    let Some(host) = host_header_value(&request.url) else {
        return;
    };
    for header in request
        .headers
        .iter_mut()
        .filter(|h| h.is_auto && h.name.eq_ignore_ascii_case("host"))
    {
        header.value = host.clone();
    }
}
