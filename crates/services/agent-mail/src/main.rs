//! Agent Mail - unified server/CLI binary.
//!
//! One binary that can run the coordination layer's HTTP/JSON-RPC surface,
//! its stdio MCP transport, or answer a handful of operator commands
//! (health check, tool schema export) against a running instance. The
//! `agent-mail-http`, `agent-mail-stdio`, and `agent-mail-cli` binaries
//! cover the same ground individually for deployments that want a single
//! fixed transport; this one is the Swiss-army entry point.

use agent_mail_common::config::AppConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "agent-mail")]
#[command(about = "Unified server/CLI for the agent coordination archive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a server.
    Serve {
        /// Transport: http, stdio, or sse.
        #[arg(short, long, default_value = "http")]
        transport: String,
    },
    /// Check a running server's health endpoint.
    Health {
        #[arg(short, long, env = "AGENT_MAIL_URL", default_value = "http://localhost:8787")]
        url: String,
    },
    /// Export JSON schemas for all tools.
    Schema {
        #[arg(short, long, default_value = "json")]
        format: String,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List all available tools.
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { transport: "http".to_string() }) {
        Commands::Serve { transport } => serve(&transport).await,
        Commands::Health { url } => health_check(&url).await,
        Commands::Schema { format, output } => export_schema(&format, output.as_deref()),
        Commands::Tools => list_tools(),
    }
}

async fn serve(transport: &str) -> Result<()> {
    let config = Arc::new(AppConfig::load().unwrap_or_default());

    match transport {
        "stdio" => {
            init_tracing(true)?;
            agent_mail_mcp::run_stdio((*config).clone()).await
        }
        "sse" => {
            init_tracing(false)?;
            agent_mail_mcp::run_sse((*config).clone()).await
        }
        _ => {
            init_tracing(false)?;
            let port = config.mcp.port;
            let app = agent_mail_server::build_app(config).await?;
            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "agent-mail listening");
            axum::serve(listener, app).await?;
            Ok(())
        }
    }
}

async fn health_check(url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let resp = client.get(format!("{url}/health")).send().await?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        anyhow::bail!("server reported unhealthy status: {status}");
    }
    Ok(())
}

fn init_tracing(to_stderr: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    match (to_stderr, json_logs) {
        (true, _) => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        (false, true) => registry.with(fmt::layer().json()).init(),
        (false, false) => registry.with(fmt::layer()).init(),
    }
    Ok(())
}

fn export_schema(format: &str, output: Option<&str>) -> Result<()> {
    let schemas = agent_mail_mcp::get_tool_schemas(false);
    let content = match format {
        "markdown" | "md" => agent_mail_mcp::docs::generate_markdown_docs(&schemas),
        _ => serde_json::to_string_pretty(&schemas)?,
    };

    if let Some(path) = output {
        std::fs::write(path, &content)?;
        eprintln!("Schema written to {path}");
    } else {
        println!("{content}");
    }
    Ok(())
}

fn list_tools() -> Result<()> {
    let schemas = agent_mail_mcp::get_tool_schemas(false);
    println!("Agent Mail Tools ({} total)\n", schemas.len());
    println!("{:<30} {}", "TOOL", "DESCRIPTION");
    println!("{}", "-".repeat(80));
    for schema in &schemas {
        println!("{:<30} {}", schema.name, schema.description);
    }
    Ok(())
}
