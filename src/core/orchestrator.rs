//! 编排器：主控循环
//!
//! 负责：按配置创建网关与身份、建立 cmd/state 两条通道，并在后台任务中消费用户命令
//! （RefreshAgents/StartChat/Submit/Abandon/Quit），驱动会话引导与轮次引擎并更新 UI 状态。
//!
//! 同一时刻只有一个网关调用在途；等待期间仍监听 Abandon/Quit，被打断时直接丢弃在途的 future，
//! 迟到的响应不会写回任何状态。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chat::{SessionResolver, Transcript, TurnEngine};
use crate::config::{AppConfig, ChatSection};
use crate::core::{SessionSupervisor, UiPhase, UiState, View};
use crate::gateway::{AgentDirectory, AgentGateway, AgentInfo, GatewayError, HttpGateway};
use crate::identity::{IdentityProvider, StaticIdentity};

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 重新拉取代理列表
    RefreshAgents,
    /// 与选中的代理开聊（清空上一段记录）
    StartChat(AgentInfo),
    /// 提交当前问题的回答
    Submit(String),
    /// 离开聊天视图，放弃在途请求
    Abandon,
    /// 退出应用
    Quit,
}

/// 运行时句柄：命令发送端、状态接收端、关闭 token 与后台任务
pub struct RuntimeHandles {
    pub cmd_tx: mpsc::UnboundedSender<Command>,
    pub state_rx: watch::Receiver<UiState>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<()>,
}

/// 按配置创建 HTTP 网关并启动运行时
pub fn create_runtime(cfg: &AppConfig) -> anyhow::Result<RuntimeHandles> {
    let identity: Arc<dyn IdentityProvider> = Arc::new(StaticIdentity::from_config(cfg));
    let http = Arc::new(HttpGateway::new(&cfg.gateway, identity.clone())?);
    tracing::info!(
        execute_url = %cfg.gateway.execute_url(),
        services_url = %cfg.gateway.services_url(),
        "Gateway configured"
    );
    Ok(spawn_runtime(http.clone(), http, identity, cfg.chat.clone()))
}

/// 启动后台任务；网关与目录可分别注入（测试中同为 MockGateway）
pub fn spawn_runtime(
    gateway: Arc<dyn AgentGateway>,
    directory: Arc<dyn AgentDirectory>,
    identity: Arc<dyn IdentityProvider>,
    chat: ChatSection,
) -> RuntimeHandles {
    // 两通道：UI -> Core 命令；Core -> UI 状态快照
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState::default());
    let shutdown = CancellationToken::new();

    let runtime = Runtime {
        resolver: SessionResolver::new(gateway.clone(), identity, &chat),
        gateway,
        directory,
        supervisor: SessionSupervisor::new(shutdown.clone()),
        state_tx,
        agents: Vec::new(),
        chat: None,
        error: None,
    };
    let task = tokio::spawn(runtime.run(cmd_rx));

    RuntimeHandles {
        cmd_tx,
        state_rx,
        shutdown,
        task,
    }
}

/// 在途调用被打断的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Abandoned,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

impl From<Interrupt> for Flow {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Abandoned => Flow::Continue,
            Interrupt::Quit => Flow::Quit,
        }
    }
}

/// 等待 future 完成，期间消费 Abandon/Quit；其余命令在忙碌时丢弃
async fn run_until_interrupted<F: Future>(
    fut: F,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    token: &CancellationToken,
) -> Result<F::Output, Interrupt> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Interrupt::Quit),
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Abandon) => return Err(Interrupt::Abandoned),
                Some(Command::Quit) | None => return Err(Interrupt::Quit),
                Some(other) => tracing::debug!(?other, "Busy, command dropped"),
            },
            out = &mut fut => return Ok(out),
        }
    }
}

/// 一次聊天的全部状态；离开聊天视图即整体丢弃
struct ChatRun {
    agent: AgentInfo,
    transcript: Transcript,
    /// 引导失败时为 None
    engine: Option<TurnEngine>,
}

struct Runtime {
    gateway: Arc<dyn AgentGateway>,
    directory: Arc<dyn AgentDirectory>,
    resolver: SessionResolver,
    supervisor: SessionSupervisor,
    state_tx: watch::Sender<UiState>,
    agents: Vec<AgentInfo>,
    chat: Option<ChatRun>,
    error: Option<String>,
}

impl Runtime {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let shutdown = self.supervisor.shutdown_token();
        loop {
            let cmd = tokio::select! {
                _ = shutdown.cancelled() => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break, // cmd_tx 已关闭，退出循环
                },
            };
            tracing::debug!(?cmd, "Command received");
            let flow = match cmd {
                Command::RefreshAgents => self.refresh_agents(&mut cmd_rx).await,
                Command::StartChat(agent) => self.start_chat(agent, &mut cmd_rx).await,
                Command::Submit(answer) => self.submit(answer, &mut cmd_rx).await,
                Command::Abandon => {
                    self.abandon();
                    Flow::Continue
                }
                Command::Quit => Flow::Quit,
            };
            if flow == Flow::Quit {
                break;
            }
        }
        self.supervisor.abandon_chat();
        tracing::info!("Runtime stopped");
    }

    async fn refresh_agents(&mut self, cmd_rx: &mut mpsc::UnboundedReceiver<Command>) -> Flow {
        self.error = None;
        self.publish(UiPhase::LoadingAgents, Some("正在加载代理列表…"));

        let token = self.supervisor.shutdown_token();
        let directory = self.directory.clone();
        match run_until_interrupted(directory.list_agents(), cmd_rx, &token).await {
            Ok(Ok(agents)) => {
                tracing::info!(count = agents.len(), "Agents loaded");
                self.agents = agents;
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Failed to load agents");
                self.error = Some(describe_gateway_error(&err));
            }
            Err(interrupt) => {
                self.publish(UiPhase::Idle, None);
                return interrupt.into();
            }
        }
        self.publish(UiPhase::Idle, None);
        Flow::Continue
    }

    async fn start_chat(
        &mut self,
        agent: AgentInfo,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Flow {
        let token = self.supervisor.begin_chat();
        self.error = None;
        self.chat = Some(ChatRun {
            agent: agent.clone(),
            transcript: Transcript::new(),
            engine: None,
        });
        self.publish(UiPhase::Bootstrapping, Some("正在初始化聊天…"));

        let Some(chat) = self.chat.as_mut() else {
            return Flow::Continue;
        };
        let fut = TurnEngine::start_chat(
            &self.resolver,
            self.gateway.clone(),
            &agent.id,
            &agent.name,
            &mut chat.transcript,
        );
        let result = match run_until_interrupted(fut, cmd_rx, &token).await {
            Ok(result) => result,
            Err(interrupt) => {
                self.abandon();
                return interrupt.into();
            }
        };

        match result {
            Ok(engine) => {
                tracing::info!(session = %engine.handle().address(), "Chat ready");
                chat.engine = Some(engine);
                self.publish(UiPhase::AwaitingAnswer, None);
            }
            Err(err) => {
                self.error = Some(err.to_string());
                self.publish(UiPhase::BootstrapFailed, None);
            }
        }
        Flow::Continue
    }

    async fn submit(
        &mut self,
        answer: String,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Flow {
        let token = self.supervisor.chat_token();
        let Some(chat) = self.chat.as_mut() else {
            tracing::debug!("No active chat, submission dropped");
            return Flow::Continue;
        };
        let Some(engine) = chat.engine.as_mut() else {
            tracing::debug!("Chat has no engine, submission dropped");
            return Flow::Continue;
        };
        if engine.is_complete() || answer.trim().is_empty() {
            return Flow::Continue;
        }

        self.error = None;
        self.publish(UiPhase::Submitting, Some("正在校验回答…"));

        let Some(chat) = self.chat.as_mut() else {
            return Flow::Continue;
        };
        let Some(engine) = chat.engine.as_mut() else {
            return Flow::Continue;
        };
        let fut = engine.submit_answer(&answer, &mut chat.transcript);
        match run_until_interrupted(fut, cmd_rx, &token).await {
            Ok(report) => {
                tracing::debug!(?report, "Turn finished");
                let phase = UiPhase::from(engine.phase());
                self.publish(phase, None);
                Flow::Continue
            }
            Err(interrupt) => {
                self.abandon();
                interrupt.into()
            }
        }
    }

    fn abandon(&mut self) {
        self.supervisor.abandon_chat();
        if let Some(chat) = self.chat.take() {
            tracing::info!(agent_id = %chat.agent.id, "Chat abandoned");
        }
        self.error = None;
        self.publish(UiPhase::Idle, None);
    }

    /// 将当前内部状态投影为 UiState 推给界面
    fn publish(&self, phase: UiPhase, loading: Option<&str>) {
        let state = match &self.chat {
            Some(chat) => UiState {
                view: View::Chat,
                agents: self.agents.clone(),
                agent_name: Some(chat.agent.name.clone()),
                phase,
                transcript: chat.transcript.entries().to_vec(),
                current_question: chat.engine.as_ref().map(|e| e.question().clone()),
                input_locked: phase != UiPhase::AwaitingAnswer,
                loading_message: loading.map(String::from),
                error_message: self.error.clone(),
            },
            None => UiState {
                view: View::AgentList,
                agents: self.agents.clone(),
                phase,
                input_locked: loading.is_some(),
                loading_message: loading.map(String::from),
                error_message: self.error.clone(),
                ..UiState::default()
            },
        };
        let _ = self.state_tx.send(state);
    }
}

fn describe_gateway_error(err: &GatewayError) -> String {
    match err {
        GatewayError::Unauthorized => "登录已失效，请更新 token 后重试".to_string(),
        other => other.to_string(),
    }
}
