//! 管理任务：代理、问题、会话、回答的增删改查
//!
//! 都是对 AgentsServices 端点的一对一封装；只有会话列表解析与问题排序带一点容错逻辑。

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::gateway::types::{id_string, ServiceTask};
use crate::gateway::{GatewayError, HttpGateway};

/// 代理概要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 管理视图中的问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminQuestion {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub validation_prompt: String,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_rag_required: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub order: Option<i64>,
}

/// 会话记录（管理视图）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSession {
    pub id: String,
    pub name: String,
    pub description: String,
    pub user: String,
}

/// 会话中的一条问答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnswer {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// 新增/修改问题的表单
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub agent_id: String,
    pub text: String,
    pub validation: String,
    pub is_rag_required: bool,
    pub order: Option<i64>,
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    id_string(&value).ok_or_else(|| serde::de::Error::custom("expected string or number id"))
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(id_string(&value))
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

/// 列表响应：数组按元素解析，null 视为空，单个对象视为一元素列表
fn parse_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, GatewayError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

const NOT_AVAILABLE: &str = "N/A";

fn session_from(record: &Value) -> Option<AgentSession> {
    let id = record.get("id").and_then(id_string)?;
    let text = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(NOT_AVAILABLE)
            .to_string()
    };
    Some(AgentSession {
        id,
        name: text("nome"),
        description: text("descrizione"),
        user: text("utente"),
    })
}

/// 会话列表容错解析：裸数组、`{sessions: [...]}`、或单条记录；无 id 的条目丢弃
pub fn parse_sessions(value: &Value) -> Vec<AgentSession> {
    if let Some(items) = value
        .as_array()
        .or_else(|| value.get("sessions").and_then(Value::as_array))
    {
        return items.iter().filter_map(session_from).collect();
    }
    if value.get("id").is_some() {
        return session_from(value).into_iter().collect();
    }
    tracing::warn!(response = %value, "Unrecognized session listing");
    Vec::new()
}

/// 有序号的排在前（升序），都没有时按 id 字典序
pub fn sort_questions(questions: &mut [AdminQuestion]) {
    questions.sort_by(|a, b| match (a.order, b.order) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

/// 管理任务接口
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, GatewayError>;

    /// 已按序号排序
    async fn list_questions(&self, agent_id: &str) -> Result<Vec<AdminQuestion>, GatewayError>;

    async fn add_question(&self, draft: &QuestionDraft) -> Result<Value, GatewayError>;

    async fn update_question(
        &self,
        question_id: &str,
        draft: &QuestionDraft,
    ) -> Result<Value, GatewayError>;

    async fn delete_question(&self, question_id: &str) -> Result<Value, GatewayError>;

    async fn create_agent(&self, name: &str, description: &str) -> Result<Value, GatewayError>;

    async fn update_agent(
        &self,
        agent_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Value, GatewayError>;

    async fn delete_agent(&self, agent_id: &str) -> Result<Value, GatewayError>;

    async fn list_sessions(&self, agent_id: &str) -> Result<Vec<AgentSession>, GatewayError>;

    async fn list_answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>, GatewayError>;

    async fn delete_answer(&self, answer_id: &str) -> Result<Value, GatewayError>;

    async fn delete_session(&self, session_id: &str) -> Result<Value, GatewayError>;
}

#[async_trait]
impl AgentDirectory for HttpGateway {
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, GatewayError> {
        parse_list(self.post_service(&ServiceTask::GetAllAgents).await?)
    }

    async fn list_questions(&self, agent_id: &str) -> Result<Vec<AdminQuestion>, GatewayError> {
        let value = self
            .post_service(&ServiceTask::GetAllQuestions { agent: agent_id })
            .await?;
        let mut questions: Vec<AdminQuestion> = parse_list(value)?;
        sort_questions(&mut questions);
        Ok(questions)
    }

    async fn add_question(&self, draft: &QuestionDraft) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::AddQuestion {
            agent: &draft.agent_id,
            domanda: &draft.text,
            validazione: &draft.validation,
            is_rag_required: draft.is_rag_required.to_string(),
            order: draft.order.map(|o| o.to_string()),
        })
        .await
    }

    async fn update_question(
        &self,
        question_id: &str,
        draft: &QuestionDraft,
    ) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::UpdateQuestion {
            id: question_id,
            agent: &draft.agent_id,
            domanda: &draft.text,
            validazione: &draft.validation,
            is_rag_required: draft.is_rag_required.to_string(),
            order: draft.order.map(|o| o.to_string()),
        })
        .await
    }

    async fn delete_question(&self, question_id: &str) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::DeleteQuestion { id: question_id })
            .await
    }

    async fn create_agent(&self, name: &str, description: &str) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::CreateAgent {
            agent: name,
            description,
        })
        .await
    }

    async fn update_agent(
        &self,
        agent_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::UpdateAgent {
            agent_id,
            agent_name: name,
            description,
        })
        .await
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::DeleteAgent { agent_id }).await
    }

    async fn list_sessions(&self, agent_id: &str) -> Result<Vec<AgentSession>, GatewayError> {
        let value = self
            .post_service(&ServiceTask::GetAllSessions { agent_id })
            .await?;
        Ok(parse_sessions(&value))
    }

    async fn list_answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>, GatewayError> {
        parse_list(
            self.post_service(&ServiceTask::GetAllAnswers {
                session: session_id,
            })
            .await?,
        )
    }

    async fn delete_answer(&self, answer_id: &str) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::DeleteAnswer { answer_id })
            .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::DeleteSession { session_id })
            .await
    }
}
