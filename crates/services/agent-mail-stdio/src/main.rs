//! Agent Mail - stdio MCP server for Claude Desktop and Antigravity integration.
//!
//! Exposes the coordination layer's verbs as MCP tools over stdio (the
//! default) or as a streamable-HTTP/SSE endpoint.

use agent_mail_common::config::AppConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "agent-mail-stdio")]
#[command(about = "Agent Mail - MCP server for autonomous coding agent coordination")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio (default)
    Serve {
        /// Transport mode: stdio or sse
        #[arg(short, long, default_value = "stdio")]
        transport: String,
    },
    /// Export JSON schemas for all tools
    Schema {
        /// Output format: json or markdown
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List all available tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        transport: "stdio".to_string(),
    }) {
        Commands::Serve { transport } => {
            let config = AppConfig::load().unwrap_or_default();
            match transport.as_str() {
                "sse" => {
                    init_tracing(false)?;
                    agent_mail_mcp::run_sse(config).await
                }
                _ => {
                    init_tracing(true)?;
                    agent_mail_mcp::run_stdio(config).await
                }
            }
        }
        Commands::Schema { format, output } => export_schema(&format, output.as_deref()),
        Commands::Tools => list_tools(),
    }
}

/// stdio transport reserves stdout for JSON-RPC frames, so logs must go to
/// stderr; SSE mode is free to log to stdout.
fn init_tracing(to_stderr: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("agent_mail_stdio=info".parse()?);
    if to_stderr {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
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
        eprintln!("Schema written to {}", path);
    } else {
        println!("{}", content);
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
