//! MCP service exposing the converted tools.

use openapi_mcp_converter::{ApiDocument, ConvertOptions, Converter, Invoker};
use rmcp::{
    ErrorData, RoleServer, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService,
        session::local::LocalSessionManager,
    },
};
use std::future::Future;
use std::sync::Arc;

struct ToolEntry {
    tool: Tool,
    invoker: Invoker,
}

/// One MCP server for one OpenAPI document.
#[derive(Clone)]
pub struct OpenApiService {
    name: String,
    version: String,
    instructions: Option<String>,
    tools: Arc<Vec<ToolEntry>>,
}

impl OpenApiService {
    /// Convert the document and wire every tool to an [`Invoker`].
    pub fn new(
        doc: &ApiDocument,
        options: ConvertOptions,
        server_name: Option<String>,
    ) -> anyhow::Result<Self> {
        let definitions = Converter::new(doc, options).convert()?;
        let client = reqwest::Client::builder().build()?;
        let default_server = doc.default_server().map(|s| s.url.clone());

        let tools: Vec<ToolEntry> = definitions
            .iter()
            .map(|def| ToolEntry {
                tool: def.to_mcp_tool(),
                invoker: Invoker::new(client.clone(), def, default_server.clone()),
            })
            .collect();
        tracing::info!(count = tools.len(), "converted document into tools");

        let info = doc.info();
        Ok(Self {
            name: server_name.unwrap_or_else(|| info.title.clone()),
            version: info.version.clone(),
            instructions: info.description.clone(),
            tools: Arc::new(tools),
        })
    }

    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Serve over stdio until the client disconnects. Logging must go to
    /// stderr in this mode; stdout carries the protocol.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let service = ServiceExt::<RoleServer>::serve(self, rmcp::transport::stdio()).await?;
        service.waiting().await?;
        Ok(())
    }

    /// Serve as a streamable HTTP endpoint under `/mcp` until interrupted.
    pub async fn serve_http(self, addr: &str) -> anyhow::Result<()> {
        let http_service = StreamableHttpService::new(
            move || Ok(self.clone()),
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig {
                stateful_mode: true,
                ..Default::default()
            },
        );

        let router = axum::Router::new().nest_service("/mcp", http_service);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening for MCP connections");

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok(())
    }
}

impl ServerHandler for OpenApiService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                ..Default::default()
            },
            instructions: self.instructions.clone(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: self.tools.iter().map(|entry| entry.tool.clone()).collect(),
                ..Default::default()
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let Some(entry) = self
                .tools
                .iter()
                .find(|entry| entry.tool.name == request.name)
            else {
                return Err(ErrorData::invalid_params(
                    format!("unknown tool: {}", request.name),
                    None,
                ));
            };

            let args = request.arguments.unwrap_or_default();
            tracing::debug!(tool = %request.name, "invoking tool");
            let outcome = entry
                .invoker
                .invoke(&args)
                .await
                .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

            Ok(CallToolResult::success(vec![Content::text(
                outcome.to_text(),
            )]))
        }
    }
}
