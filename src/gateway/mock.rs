//! Mock 网关（用于测试，无需远端服务）
//!
//! 按方法维护应答队列，队列空时返回默认值；记录每次调用，便于断言请求顺序与会话地址。
//! 会话列表可设为「回显」模式：把最近一次 Execute 的 session_name 作为 nome 返回，
//! 以便测试无法预知的随机关联 id。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateway::directory::{
    parse_sessions, sort_questions, AdminQuestion, AgentDirectory, AgentInfo, AgentSession,
    QuestionDraft, SessionAnswer,
};
use crate::gateway::{AgentGateway, GatewayError};

/// 记录下来的网关调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Execute {
        agent_id: String,
        user_email: String,
        session_name: String,
        description: String,
    },
    GetAllSessions {
        agent_id: String,
    },
    RetrieveQuestion {
        session: String,
    },
    ValidateAnswer {
        session: String,
        answer: String,
    },
    /// 管理任务，记录任务名与主要参数
    Service {
        task: String,
        target: String,
    },
}

/// GetAllSessions 的应答方式
#[derive(Debug, Clone)]
pub enum SessionListing {
    /// 返回 `[{id, nome: <最近一次 Execute 的 session_name>}]`
    Echo { id: u64 },
    Fixed(Value),
    Fail(String),
}

type Reply = Result<Value, String>;

/// 可脚本化的内存网关
#[derive(Debug)]
pub struct MockGateway {
    calls: Mutex<Vec<GatewayCall>>,
    execute_reply: Mutex<Reply>,
    listing: Mutex<SessionListing>,
    retrieve: Mutex<VecDeque<Reply>>,
    validate: Mutex<VecDeque<Reply>>,
    agents: Mutex<Vec<AgentInfo>>,
    questions: Mutex<Vec<AdminQuestion>>,
    latency: Option<Duration>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            execute_reply: Mutex::new(Ok(json!({}))),
            listing: Mutex::new(SessionListing::Fixed(json!([]))),
            retrieve: Mutex::new(VecDeque::new()),
            validate: Mutex::new(VecDeque::new()),
            agents: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
            latency: None,
        }
    }
}

fn failure(reason: String) -> GatewayError {
    GatewayError::Status {
        status: 503,
        body: reason,
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用前等待的时长（测试中途放弃会话用）
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_agents(self, agents: Vec<AgentInfo>) -> Self {
        *lock(&self.agents) = agents;
        self
    }

    pub fn with_questions(self, questions: Vec<AdminQuestion>) -> Self {
        *lock(&self.questions) = questions;
        self
    }

    pub fn with_listing(self, listing: SessionListing) -> Self {
        *lock(&self.listing) = listing;
        self
    }

    pub fn fail_execute(self, reason: &str) -> Self {
        *lock(&self.execute_reply) = Err(reason.to_string());
        self
    }

    /// 追加一个 RetrieveQuestion 应答
    pub fn push_retrieve(&self, reply: Value) -> &Self {
        lock(&self.retrieve).push_back(Ok(reply));
        self
    }

    pub fn push_retrieve_error(&self, reason: &str) -> &Self {
        lock(&self.retrieve).push_back(Err(reason.to_string()));
        self
    }

    /// 追加一个 ValidateAnswer 应答
    pub fn push_validate(&self, reply: Value) -> &Self {
        lock(&self.validate).push_back(Ok(reply));
        self
    }

    pub fn push_validate_error(&self, reason: &str) -> &Self {
        lock(&self.validate).push_back(Err(reason.to_string()));
        self
    }

    /// 全部调用记录（按发生顺序）
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    /// 所有 RetrieveQuestion / ValidateAnswer 使用的会话地址
    pub fn session_addresses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::RetrieveQuestion { session }
                | GatewayCall::ValidateAnswer { session, .. } => Some(session),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        lock(&self.calls).push(call);
    }

    fn record_service(&self, task: &str, target: &str) {
        self.record(GatewayCall::Service {
            task: task.to_string(),
            target: target.to_string(),
        });
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn last_session_name(&self) -> Option<String> {
        lock(&self.calls).iter().rev().find_map(|call| match call {
            GatewayCall::Execute { session_name, .. } => Some(session_name.clone()),
            _ => None,
        })
    }

    fn listing_reply(&self) -> Reply {
        match lock(&self.listing).clone() {
            SessionListing::Echo { id } => Ok(match self.last_session_name() {
                Some(name) => json!([{ "id": id, "nome": name }]),
                None => json!([]),
            }),
            SessionListing::Fixed(value) => Ok(value),
            SessionListing::Fail(reason) => Err(reason),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl AgentGateway for MockGateway {
    async fn execute(
        &self,
        agent_id: &str,
        user_email: &str,
        session_name: &str,
        description: &str,
    ) -> Result<Value, GatewayError> {
        self.wait().await;
        self.record(GatewayCall::Execute {
            agent_id: agent_id.to_string(),
            user_email: user_email.to_string(),
            session_name: session_name.to_string(),
            description: description.to_string(),
        });
        lock(&self.execute_reply).clone().map_err(failure)
    }

    async fn get_all_sessions(&self, agent_id: &str) -> Result<Value, GatewayError> {
        self.wait().await;
        self.record(GatewayCall::GetAllSessions {
            agent_id: agent_id.to_string(),
        });
        self.listing_reply().map_err(failure)
    }

    async fn retrieve_question(&self, session: &str) -> Result<Value, GatewayError> {
        self.wait().await;
        self.record(GatewayCall::RetrieveQuestion {
            session: session.to_string(),
        });
        lock(&self.retrieve)
            .pop_front()
            .unwrap_or(Ok(Value::Null))
            .map_err(failure)
    }

    async fn validate_answer(&self, session: &str, answer: &str) -> Result<Value, GatewayError> {
        self.wait().await;
        self.record(GatewayCall::ValidateAnswer {
            session: session.to_string(),
            answer: answer.to_string(),
        });
        lock(&self.validate)
            .pop_front()
            .unwrap_or(Ok(Value::Null))
            .map_err(failure)
    }
}

#[async_trait]
impl AgentDirectory for MockGateway {
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, GatewayError> {
        self.wait().await;
        self.record_service("GetAllAgents", "");
        Ok(lock(&self.agents).clone())
    }

    async fn list_questions(&self, agent_id: &str) -> Result<Vec<AdminQuestion>, GatewayError> {
        self.record_service("GetAllQuestions", agent_id);
        let mut questions: Vec<AdminQuestion> = lock(&self.questions)
            .iter()
            .filter(|q| q.agent_id.as_deref() == Some(agent_id))
            .cloned()
            .collect();
        sort_questions(&mut questions);
        Ok(questions)
    }

    async fn add_question(&self, draft: &QuestionDraft) -> Result<Value, GatewayError> {
        self.record_service("AddQuestion", &draft.agent_id);
        Ok(Value::Null)
    }

    async fn update_question(
        &self,
        question_id: &str,
        _draft: &QuestionDraft,
    ) -> Result<Value, GatewayError> {
        self.record_service("UpdateQuestion", question_id);
        Ok(Value::Null)
    }

    async fn delete_question(&self, question_id: &str) -> Result<Value, GatewayError> {
        self.record_service("DeleteQuestion", question_id);
        Ok(Value::Null)
    }

    async fn create_agent(&self, name: &str, _description: &str) -> Result<Value, GatewayError> {
        self.record_service("CreateAgent", name);
        Ok(Value::Null)
    }

    async fn update_agent(
        &self,
        agent_id: &str,
        _name: &str,
        _description: &str,
    ) -> Result<Value, GatewayError> {
        self.record_service("UpdateAgent", agent_id);
        Ok(Value::Null)
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<Value, GatewayError> {
        self.record_service("DeleteAgent", agent_id);
        Ok(Value::Null)
    }

    async fn list_sessions(&self, agent_id: &str) -> Result<Vec<AgentSession>, GatewayError> {
        self.record_service("GetAllSessions", agent_id);
        self.listing_reply()
            .map(|value| parse_sessions(&value))
            .map_err(failure)
    }

    async fn list_answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>, GatewayError> {
        self.record_service("GetAllAnswers", session_id);
        Ok(Vec::new())
    }

    async fn delete_answer(&self, answer_id: &str) -> Result<Value, GatewayError> {
        self.record_service("DeleteAnswer", answer_id);
        Ok(Value::Null)
    }

    async fn delete_session(&self, session_id: &str) -> Result<Value, GatewayError> {
        self.record_service("DeleteSession", session_id);
        Ok(Value::Null)
    }
}
