//! ChangeOps 管理 CLI
//!
//! 代理、问题、会话、回答的增删改查；每个子命令对应 AgentsServices 端点上的一个任务。
//! 列表类命令以 JSON 输出到 stdout，日志写 stderr。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use changeops::config::load_config_or_default;
use changeops::gateway::{AgentDirectory, HttpGateway, QuestionDraft};
use changeops::identity::StaticIdentity;
use changeops::observability;

/// ChangeOps agent administration
#[derive(Parser, Debug)]
#[command(name = "changeops-admin")]
#[command(about = "Manage agents, questions, sessions and answers", long_about = None)]
#[command(version)]
struct Args {
    /// Path to a TOML config file (overrides config/default.toml)
    #[arg(long, global = true, env = "CHANGEOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Bearer token (overrides [auth].token)
    #[arg(long, global = true, env = "CHANGEOPS_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Resource,
}

#[derive(Subcommand, Debug)]
enum Resource {
    /// Agents
    #[command(subcommand)]
    Agents(AgentCmd),
    /// Questions of an agent
    #[command(subcommand)]
    Questions(QuestionCmd),
    /// Chat sessions of an agent
    #[command(subcommand)]
    Sessions(SessionCmd),
    /// Answers recorded in a session
    #[command(subcommand)]
    Answers(AnswerCmd),
}

#[derive(Subcommand, Debug)]
enum AgentCmd {
    List,
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        id: String,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Delete { id: String },
}

#[derive(clap::Args, Debug)]
struct QuestionFields {
    /// Question text
    text: String,
    /// Natural-language validation rule
    #[arg(long, default_value = "")]
    validation: String,
    /// The gateway consults the retrieval subsystem before answering
    #[arg(long)]
    rag: bool,
    /// Position in the agent's question sequence
    #[arg(long)]
    order: Option<i64>,
}

impl QuestionFields {
    fn into_draft(self, agent_id: String) -> QuestionDraft {
        QuestionDraft {
            agent_id,
            text: self.text,
            validation: self.validation,
            is_rag_required: self.rag,
            order: self.order,
        }
    }
}

#[derive(Subcommand, Debug)]
enum QuestionCmd {
    List {
        agent_id: String,
    },
    Add {
        agent_id: String,
        #[command(flatten)]
        fields: QuestionFields,
    },
    Update {
        id: String,
        agent_id: String,
        #[command(flatten)]
        fields: QuestionFields,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCmd {
    List { agent_id: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum AnswerCmd {
    List { session_id: String },
    Delete { id: String },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to encode output")?
    );
    Ok(())
}

/// 写操作的响应形状不固定，非空时原样打印
fn print_ack(action: &str, response: &Value) -> anyhow::Result<()> {
    tracing::info!("{} done", action);
    if !response.is_null() {
        print_json(response)?;
    }
    Ok(())
}

async fn run(directory: &dyn AgentDirectory, command: Resource) -> anyhow::Result<()> {
    match command {
        Resource::Agents(cmd) => match cmd {
            AgentCmd::List => print_json(&directory.list_agents().await.context("GetAllAgents")?),
            AgentCmd::Create { name, description } => print_ack(
                "CreateAgent",
                &directory
                    .create_agent(&name, &description)
                    .await
                    .context("CreateAgent")?,
            ),
            AgentCmd::Update {
                id,
                name,
                description,
            } => print_ack(
                "UpdateAgent",
                &directory
                    .update_agent(&id, &name, &description)
                    .await
                    .context("UpdateAgent")?,
            ),
            AgentCmd::Delete { id } => print_ack(
                "DeleteAgent",
                &directory.delete_agent(&id).await.context("DeleteAgent")?,
            ),
        },
        Resource::Questions(cmd) => match cmd {
            QuestionCmd::List { agent_id } => print_json(
                &directory
                    .list_questions(&agent_id)
                    .await
                    .context("GetAllQuestions")?,
            ),
            QuestionCmd::Add { agent_id, fields } => {
                let draft = fields.into_draft(agent_id);
                print_ack(
                    "AddQuestion",
                    &directory.add_question(&draft).await.context("AddQuestion")?,
                )
            }
            QuestionCmd::Update {
                id,
                agent_id,
                fields,
            } => {
                let draft = fields.into_draft(agent_id);
                print_ack(
                    "UpdateQuestion",
                    &directory
                        .update_question(&id, &draft)
                        .await
                        .context("UpdateQuestion")?,
                )
            }
            QuestionCmd::Delete { id } => print_ack(
                "DeleteQuestion",
                &directory
                    .delete_question(&id)
                    .await
                    .context("DeleteQuestion")?,
            ),
        },
        Resource::Sessions(cmd) => match cmd {
            SessionCmd::List { agent_id } => print_json(
                &directory
                    .list_sessions(&agent_id)
                    .await
                    .context("GetAllSessions")?,
            ),
            SessionCmd::Delete { id } => print_ack(
                "DeleteSession",
                &directory.delete_session(&id).await.context("DeleteSession")?,
            ),
        },
        Resource::Answers(cmd) => match cmd {
            AnswerCmd::List { session_id } => print_json(
                &directory
                    .list_answers(&session_id)
                    .await
                    .context("GetAllAnswers")?,
            ),
            AnswerCmd::Delete { id } => print_ack(
                "DeleteAnswer",
                &directory.delete_answer(&id).await.context("DeleteAnswer")?,
            ),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    observability::init();

    let mut cfg = load_config_or_default(args.config);
    if args.token.is_some() {
        cfg.auth.token = args.token;
    }

    let identity = Arc::new(StaticIdentity::from_config(&cfg));
    let gateway =
        HttpGateway::new(&cfg.gateway, identity).context("Failed to build gateway client")?;

    run(&gateway, args.command).await
}
