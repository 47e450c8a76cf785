//! 状态定义：UiState 投影
//!
//! UI 只持有轻量的 UiState（视图、阶段、记录、锁、错误）；引擎与会话身份由 Orchestrator 独占，
//! 每一步之后投影成新的 UiState 推给界面。

use serde::Serialize;

use crate::chat::{ChatPhase, Question, TranscriptEntry};
use crate::gateway::AgentInfo;

/// 当前视图
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum View {
    AgentList,
    Chat,
}

/// 界面阶段（UI 投影用）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UiPhase {
    Idle,
    LoadingAgents,
    Bootstrapping,
    AwaitingAnswer,
    /// 提交中或解释响应中，输入被锁定
    Submitting,
    Complete,
    /// 引导失败，只能返回代理列表
    BootstrapFailed,
}

impl From<ChatPhase> for UiPhase {
    fn from(phase: ChatPhase) -> Self {
        match phase {
            ChatPhase::AwaitingAnswer => UiPhase::AwaitingAnswer,
            ChatPhase::Submitting | ChatPhase::Evaluating => UiPhase::Submitting,
            ChatPhase::Complete => UiPhase::Complete,
        }
    }
}

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Serialize)]
pub struct UiState {
    pub view: View,
    pub agents: Vec<AgentInfo>,
    /// 聊天视图中的代理显示名
    pub agent_name: Option<String>,
    pub phase: UiPhase,
    pub transcript: Vec<TranscriptEntry>,
    pub current_question: Option<Question>,
    pub input_locked: bool,
    pub loading_message: Option<String>,
    pub error_message: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            view: View::AgentList,
            agents: Vec::new(),
            agent_name: None,
            phase: UiPhase::Idle,
            transcript: Vec::new(),
            current_question: None,
            input_locked: false,
            loading_message: None,
            error_message: None,
        }
    }
}

impl UiState {
    /// 只有等待回答时允许输入
    pub fn accepts_input(&self) -> bool {
        self.view == View::Chat && self.phase == UiPhase::AwaitingAnswer && !self.input_locked
    }
}
