//! Agent Mail - operator CLI.
//!
//! A thin command-line front end over the same `agent-mail-core` BMC layer
//! the HTTP and stdio services use, for scripting and local operator
//! workflows: project/agent bootstrap, sending a message from a shell, and
//! installing/removing the pre-commit reservation guard in a target repo.

use agent_mail_common::config::AppConfig;
use agent_mail_core::model::agent::{AgentBmc, AgentForRegister};
use agent_mail_core::model::message::{MessageBmc, MessageForSend};
use agent_mail_core::model::project::ProjectBmc;
use agent_mail_core::store::fs_store;
use agent_mail_core::{Ctx, ModelManager};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agent-mail")]
#[command(author, version, about = "Operator CLI for the agent coordination archive", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create (or fetch) a project by its human key.
    EnsureProject { human_key: String },
    /// List every known project.
    ListProjects,
    /// Register (or fetch) an agent in a project.
    RegisterAgent {
        project_key: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Look up an agent's registry entry.
    Whois { project_key: String, name: String },
    /// Send a message from the command line.
    SendMessage {
        project_key: String,
        #[arg(long)]
        from: String,
        #[arg(long = "to")]
        to: Vec<String>,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
    },
    /// Pre-commit guard hook management.
    Guard {
        #[command(subcommand)]
        command: GuardCommands,
    },
}

#[derive(Subcommand, Debug)]
enum GuardCommands {
    /// Install the guard hook into a target repository.
    Install {
        project_key: String,
        /// Working directory of the target git repository (must contain `.git`).
        target_repo: PathBuf,
    },
    /// Remove a previously installed guard hook.
    Uninstall { target_repo: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(AppConfig::load().unwrap_or_default());
    let mm = ModelManager::new(config).await?;
    let ctx = Ctx::root_ctx();

    match cli.command {
        Commands::EnsureProject { human_key } => {
            let project = ProjectBmc::ensure_project(&ctx, &mm, &human_key).await?;
            println!("{}", serde_json::to_string_pretty(&project)?);
        }
        Commands::ListProjects => {
            let projects = ProjectBmc::list_all(&ctx, &mm).await?;
            println!("{}", serde_json::to_string_pretty(&projects)?);
        }
        Commands::RegisterAgent { project_key, name, program, model } => {
            let project = resolve_project(&ctx, &mm, &project_key).await?;
            let agent = AgentBmc::register(
                &ctx,
                &mm,
                AgentForRegister {
                    project_id: project.id,
                    name_hint: name,
                    program,
                    model,
                    task: None,
                    attachments_policy: None,
                    contact_policy: None,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&agent)?);
        }
        Commands::Whois { project_key, name } => {
            let project = resolve_project(&ctx, &mm, &project_key).await?;
            let agent = AgentBmc::get_by_name(&ctx, &mm, project.id, &name).await?;
            println!("{}", serde_json::to_string_pretty(&agent)?);
        }
        Commands::SendMessage { project_key, from, to, subject, body } => {
            if to.is_empty() {
                bail!("at least one recipient is required");
            }
            let project = resolve_project(&ctx, &mm, &project_key).await?;
            let sender = AgentBmc::get_by_name(&ctx, &mm, project.id, &from).await?;
            let mut recipient_ids = Vec::with_capacity(to.len());
            for name in &to {
                recipient_ids.push(AgentBmc::get_by_name(&ctx, &mm, project.id, name).await?.id);
            }
            let result = MessageBmc::send(
                &ctx,
                &mm,
                MessageForSend {
                    project_id: project.id,
                    sender_id: sender.id,
                    to: recipient_ids,
                    cc: Vec::new(),
                    bcc: Vec::new(),
                    subject,
                    body_md: body,
                    importance: "normal".to_string(),
                    ack_required: false,
                    thread_id: None,
                    attachment_paths: Vec::new(),
                    convert_images: None,
                    image_embed_policy: None,
                    inline_max_bytes: None,
                    auto_contact_if_blocked: false,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Guard { command } => match command {
            GuardCommands::Install { project_key, target_repo } => {
                let project = resolve_project(&ctx, &mm, &project_key).await?;
                let archive_root = fs_store::project_repo_root(&mm.repo_root, &project.slug);
                let hook = agent_mail_core::guard::install(&target_repo, &archive_root)?;
                println!("installed guard hook at {}", hook.display());
            }
            GuardCommands::Uninstall { target_repo } => {
                let removed = agent_mail_core::guard::uninstall(&target_repo)?;
                if removed {
                    println!("removed guard hook from {}", target_repo.display());
                } else {
                    println!("no guard hook installed at {}", target_repo.display());
                }
            }
        },
    }

    Ok(())
}

/// Resolves `key` as a project slug first, falling back to `human_key`.
async fn resolve_project(
    ctx: &Ctx,
    mm: &ModelManager,
    key: &str,
) -> Result<agent_mail_core::model::project::Project> {
    if let Ok(project) = ProjectBmc::get_by_slug(ctx, mm, key).await {
        return Ok(project);
    }
    Ok(ProjectBmc::get_by_human_key(ctx, mm, key).await?)
}
