//! MCP server for an OpenAPI document.
//!
//! Loads an OpenAPI v3 document, converts every operation into an MCP tool,
//! and serves the tool set over stdio (the default) or streamable HTTP.

use anyhow::Context as _;
use clap::Parser;
use openapi_mcp_converter::{ApiDocument, ConvertOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod service;

use service::OpenApiService;

#[derive(Debug, Parser)]
#[command(name = "openapi-mcp-server", version, about)]
struct Cli {
    /// OpenAPI v3 document to serve (JSON or YAML).
    #[arg(long, env = "OPENAPI_MCP_FILE")]
    file: PathBuf,

    /// Serve streamable HTTP on this address instead of stdio,
    /// e.g. `127.0.0.1:8080`.
    #[arg(long, env = "OPENAPI_MCP_HTTP")]
    http: Option<String>,

    /// Prefix prepended to every generated tool name.
    #[arg(long, env = "OPENAPI_MCP_NAME_PREFIX")]
    name_prefix: Option<String>,

    /// Server name advertised to MCP clients; defaults to the document title.
    #[arg(long, env = "OPENAPI_MCP_SERVER_NAME")]
    server_name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Stdout carries the protocol in stdio mode; logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let bytes = std::fs::read(&cli.file)
        .with_context(|| format!("read OpenAPI document {}", cli.file.display()))?;
    let doc = ApiDocument::from_bytes(&bytes)
        .with_context(|| format!("load OpenAPI document {}", cli.file.display()))?;

    let options = ConvertOptions {
        tool_name_prefix: cli.name_prefix,
    };
    let service = OpenApiService::new(&doc, options, cli.server_name)?;
    tracing::info!(
        tools = service.tool_count(),
        document = %cli.file.display(),
        "starting MCP server"
    );

    match cli.http {
        Some(addr) => service.serve_http(&addr).await,
        None => service.serve_stdio().await,
    }
}
