//! MCP server handler, shared application state, and tool router.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use rmcp::handler::server::{
    tool::{ToolCallContext, ToolRoute, ToolRouter},
    ServerHandler,
};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use tracing::{info_span, warn};

use crate::cloud::CloudClient;
use crate::config::{AccessToken, GlobalConfig};
use crate::logs::LogStore;
use crate::mcp::proxy_tool;
use crate::proxy::{ProxyClient, ToolDescriptor};
use crate::workflow::WorkflowParser;

/// Shared application state accessible by all MCP tool handlers.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Proxy session to the standalone RWX MCP server.
    pub proxy: Arc<ProxyClient>,
    /// Cloud API client.
    pub cloud: CloudClient,
    /// Log download store.
    pub logs: Arc<LogStore>,
    /// Session-owned access token slot.
    pub access_token: AccessToken,
    /// Workflow parser seam.
    pub workflow_parser: Arc<dyn WorkflowParser>,
}

/// MCP server implementation exposing proxied and native CI tools.
pub struct BridgeServer {
    state: Arc<AppState>,
    tools: Vec<Tool>,
    router: ToolRouter<Self>,
}

impl BridgeServer {
    /// Build the server: proxied routes first (one per descriptor discovered
    /// during the proxy handshake), then the native tool routes.
    #[must_use]
    pub fn new(state: Arc<AppState>, proxied: &[ToolDescriptor]) -> Self {
        let mut router = ToolRouter::new();
        let mut tools = Vec::new();

        let native = Self::native_tools();
        let native_names: HashSet<&str> = native.iter().map(|tool| tool.name.as_ref()).collect();

        let rewrite = state.config.proxy.rewrite_references;
        for descriptor in proxied {
            if native_names.contains(descriptor.name.as_str()) {
                warn!(
                    tool = %descriptor.name,
                    "proxied tool shadows a native tool, skipping registration"
                );
                continue;
            }

            let tool = proxy_tool::local_tool(descriptor);
            tools.push(tool.clone());

            let client = Arc::clone(&state.proxy);
            let name = descriptor.name.clone();
            router.add_route(ToolRoute::new_dyn(tool, move |context| {
                let client = Arc::clone(&client);
                let name = name.clone();
                Box::pin(async move {
                    let args = context.arguments.unwrap_or_default();
                    Ok(proxy_tool::forward(&client, &name, args, rewrite).await)
                })
            }));
        }

        for tool in native {
            tools.push(tool.clone());
            Self::add_native_route(&mut router, tool);
        }

        Self {
            state,
            tools,
            router,
        }
    }

    /// Access the shared application state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Registered tool definitions, proxied first.
    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    fn add_native_route(router: &mut ToolRouter<Self>, tool: Tool) {
        use crate::mcp::tools;

        let name = tool.name.to_string();
        match name.as_str() {
            "launch_ci_run" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::launch_run::handle(context))
            })),
            "wait_for_ci_run" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::wait_for_run::handle(context))
            })),
            "get_run_results" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::run_results::handle(context))
            })),
            "get_recent_runs" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::recent_runs::handle(context))
            })),
            "get_task_logs" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::task_logs::handle(context))
            })),
            "head_logs" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::head_logs::handle(context))
            })),
            "tail_logs" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::tail_logs::handle(context))
            })),
            "grep_logs" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::grep_logs::handle(context))
            })),
            "get_artifacts" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::artifacts::handle(context))
            })),
            "analyze_ci_run" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::analyze_run::handle(context))
            })),
            "compare_runs" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::compare_runs::handle(context))
            })),
            "validate_workflow" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::validate_workflow::handle(context))
            })),
            "verify_rwx_cli" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::verify_cli::handle(context))
            })),
            "set_rwx_access_token" => router.add_route(ToolRoute::new_dyn(tool, |context| {
                Box::pin(tools::set_access_token::handle(context))
            })),
            _ => router.add_route(ToolRoute::new_dyn(tool, |_context| {
                Box::pin(async {
                    Err(rmcp::ErrorData::internal_error("tool not implemented", None))
                })
            })),
        }
    }

    /// Convert a `serde_json::Value::Object` into the `Arc<Map>` expected by `Tool`.
    fn schema(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
        match value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::default()),
        }
    }

    /// Native tool definitions, in registration order.
    #[allow(clippy::too_many_lines)] // Tool definitions are intentionally verbose for clarity.
    #[must_use]
    pub fn native_tools() -> Vec<Tool> {
        vec![
            Tool {
                name: "launch_ci_run".into(),
                description: Some(
                    "Launch a CI run for a git ref via the rwx CLI. Returns the run id and \
                     cloud URL."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "ref": { "type": "string", "description": "Git ref (branch name or commit SHA)" },
                        "targets": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Specific tasks to target (optional)"
                        }
                    },
                    "required": ["ref"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "wait_for_ci_run".into(),
                description: Some(
                    "Poll a CI run until it completes or the timeout elapses.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "run_id": { "type": "string", "description": "RWX run ID or full URL to wait for" },
                        "timeout_seconds": { "type": "number", "description": "Maximum time to wait in seconds (default: 1800 = 30 min)", "default": 1800 },
                        "poll_interval_seconds": { "type": "number", "description": "Seconds between status checks (default: 30)", "default": 30 }
                    },
                    "required": ["run_id"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "get_run_results".into(),
                description: Some(
                    "Fetch per-task results for a run and summarize successes, failures, \
                     skips, and cache hits."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "run_id": { "type": "string", "description": "RWX run ID or full URL to get results for" }
                    },
                    "required": ["run_id"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "get_recent_runs".into(),
                description: Some(
                    "List recent CI runs for a branch, filtered to the configured workflow.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "ref": { "type": "string", "description": "Git ref (branch name) to filter runs by" },
                        "limit": { "type": "number", "description": "Number of runs to return (default: 5)", "default": 5 }
                    },
                    "required": ["ref"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "get_task_logs".into(),
                description: Some(
                    "Download full logs for a task and extract failure highlights.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "task_id": { "type": "string", "description": "RWX task ID (32-char hex) - get from Honeycomb cicd.pipeline.task.run.url.full" }
                    },
                    "required": ["task_id"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "head_logs".into(),
                description: Some("Get the first lines of a run or task log, paginated.".into()),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "RWX run ID or task ID" },
                        "lines": { "type": "number", "description": "Number of lines to return from the beginning (default: 50, max: 50)", "default": 50 },
                        "offset": { "type": "number", "description": "Line offset to start from (default: 0). Use for pagination.", "default": 0 }
                    },
                    "required": ["id"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "tail_logs".into(),
                description: Some("Get the last lines of a run or task log, paginated.".into()),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "RWX run ID or task ID" },
                        "lines": { "type": "number", "description": "Number of lines to return from the end (default: 50, max: 50)", "default": 50 },
                        "offset": { "type": "number", "description": "Line offset from the end (default: 0). Use for pagination to see earlier lines.", "default": 0 }
                    },
                    "required": ["id"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "grep_logs".into(),
                description: Some(
                    "Search a run or task log for a pattern with surrounding context.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "RWX run ID or task ID" },
                        "pattern": { "type": "string", "description": "Pattern to search for in the logs (case-insensitive)" },
                        "context": { "type": "number", "description": "Number of context lines before and after matches (default: 3)", "default": 3 },
                        "page": { "type": "number", "description": "Page number (default: 1). Each page returns up to 50 lines of output.", "default": 1 }
                    },
                    "required": ["id", "pattern"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "get_artifacts".into(),
                description: Some("List or download artifacts produced by a run.".into()),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "run_id": { "type": "string", "description": "RWX run ID or full URL to get artifacts for" },
                        "download": { "type": "boolean", "description": "Download artifacts to current directory (default: false, just list)", "default": false },
                        "artifact_key": { "type": "string", "description": "Specific artifact key to download (optional, downloads all if not specified)" }
                    },
                    "required": ["run_id"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "analyze_ci_run".into(),
                description: Some(
                    "Build a step-by-step Honeycomb analysis plan for a CI run.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "run_id": { "type": "string", "description": "RWX run ID or full URL" }
                    },
                    "required": ["run_id"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "compare_runs".into(),
                description: Some(
                    "Build a Honeycomb query comparing task durations across two runs.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "run_id_1": { "type": "string", "description": "First run ID" },
                        "run_id_2": { "type": "string", "description": "Second run ID" }
                    },
                    "required": ["run_id_1", "run_id_2"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "validate_workflow".into(),
                description: Some(
                    "Validate an RWX workflow YAML definition and report diagnostics with \
                     line/column positions."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "file_path": { "type": "string", "description": "Path to the RWX workflow YAML file to validate. If not provided, content must be specified." },
                        "content": { "type": "string", "description": "YAML content to validate directly. If not provided, file_path must be specified." }
                    }
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "verify_rwx_cli".into(),
                description: Some(
                    "Verify the rwx CLI is installed and meets the minimum version.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "confirmed": { "type": "string", "description": "Confirmation that the CLI has been installed (value: \"installed\")" }
                    }
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
            Tool {
                name: "set_rwx_access_token".into(),
                description: Some(
                    "Configure the RWX access token for this session.".into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "token": { "type": "string", "description": "The RWX access token to configure" }
                    },
                    "required": ["token"]
                })),
                output_schema: None,
                annotations: None,
                title: None,
                icons: None,
                meta: None,
            },
        ]
    }
}

impl ServerHandler for BridgeServer {
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_ {
        let _span = info_span!("call_tool", tool = %request.name).entered();

        async move {
            self.router
                .call(ToolCallContext::new(self, request, context))
                .await
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, rmcp::ErrorData>> + Send + '_ {
        let tools = self.tools.clone();

        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }
}
