//! 会话引导：生成关联 id → Execute 建会话 → 会话列表中找回数字 id → 按回退链取第一题
//!
//! 回退链：(a) 数字 id（若已找回）→ (b) 关联 id。每次尝试相互独立，
//! 某次出错只记录原因并尝试下一个；拿到可识别的问题即停止。全部失败才报 Bootstrap 错误。

use std::sync::Arc;

use crate::chat::error::{AttemptFailure, ChatError};
use crate::chat::session::{CorrelationId, SessionAddress, SessionHandle};
use crate::chat::transcript::{Transcript, TranscriptEntry};
use crate::chat::turn::Question;
use crate::config::ChatSection;
use crate::gateway::types::{find_session_id, recognize_question, SessionLookup};
use crate::gateway::AgentGateway;
use crate::identity::IdentityProvider;

/// 引导失败时写入记录的唯一一条消息
pub const BOOTSTRAP_APOLOGY: &str = "初始化聊天时出错，请稍后重试。";

/// 开场白（点名代理）
pub fn greeting(agent_name: &str) -> String {
    format!("欢迎与 {agent_name} 对话！我会向你提出几个问题来完成这项任务。")
}

/// 引导成功的产物，交给 TurnEngine
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub handle: SessionHandle,
    pub question: Question,
}

pub struct SessionResolver {
    gateway: Arc<dyn AgentGateway>,
    identity: Arc<dyn IdentityProvider>,
    description: String,
}

impl SessionResolver {
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        identity: Arc<dyn IdentityProvider>,
        chat: &ChatSection,
    ) -> Self {
        Self {
            gateway,
            identity,
            description: chat.session_description.clone(),
        }
    }

    /// 为代理建立会话并取第一题。
    ///
    /// 成功时记录被清空并写入「开场白 + 第一题」两条；失败时清空并只写一条致歉消息。
    pub async fn resolve(
        &self,
        agent_id: &str,
        agent_name: &str,
        transcript: &mut Transcript,
    ) -> Result<Bootstrap, ChatError> {
        transcript.clear();
        match self.establish(agent_id, agent_name).await {
            Ok(bootstrap) => {
                transcript.push(TranscriptEntry::agent(greeting(agent_name)));
                transcript.push(TranscriptEntry::agent(bootstrap.question.display_text()));
                Ok(bootstrap)
            }
            Err(err) => {
                tracing::error!(agent_id, error = %err, "Chat bootstrap failed");
                transcript.push(TranscriptEntry::agent(BOOTSTRAP_APOLOGY));
                Err(err)
            }
        }
    }

    async fn establish(&self, agent_id: &str, agent_name: &str) -> Result<Bootstrap, ChatError> {
        let correlation_id = CorrelationId::generate();
        let mut handle = SessionHandle::new(correlation_id, agent_id, agent_name);
        tracing::info!(agent_id, correlation_id = %handle.correlation_id(), "Starting chat");

        let user_email = self.identity.user_email();
        if let Err(err) = self
            .gateway
            .execute(
                agent_id,
                &user_email,
                handle.correlation_id().as_str(),
                &self.description,
            )
            .await
        {
            return Err(ChatError::Bootstrap {
                agent_id: agent_id.to_string(),
                attempts: vec![AttemptFailure {
                    attempt: "Execute".into(),
                    reason: err.to_string(),
                }],
            });
        }

        match self.gateway.get_all_sessions(agent_id).await {
            Ok(listing) => match find_session_id(&listing, handle.correlation_id().as_str()) {
                SessionLookup::Found(id) => {
                    handle.set_numeric_id(id);
                    tracing::info!(numeric_id = id, "Resolved numeric session id");
                }
                SessionLookup::NotFound => {
                    tracing::warn!(correlation_id = %handle.correlation_id(), "No session matches correlation id")
                }
                SessionLookup::NotAnArray => {
                    tracing::warn!(response = %listing, "Session listing is not an array")
                }
            },
            Err(err) => tracing::warn!(error = %err, "Session listing failed, continuing without numeric id"),
        }

        let question = self.first_question(&handle).await?;
        Ok(Bootstrap { handle, question })
    }

    async fn first_question(&self, handle: &SessionHandle) -> Result<Question, ChatError> {
        let mut addresses = Vec::with_capacity(2);
        if let Some(id) = handle.numeric_id() {
            addresses.push(SessionAddress::Numeric(id));
        }
        addresses.push(SessionAddress::Correlation(handle.correlation_id()));

        let mut attempts = Vec::new();
        for address in addresses {
            let attempt = match address {
                SessionAddress::Numeric(id) => format!("RetrieveQuestion via numeric id {id}"),
                SessionAddress::Correlation(cid) => {
                    format!("RetrieveQuestion via correlation id {cid}")
                }
            };
            match self.gateway.retrieve_question(&address.to_string()).await {
                Ok(value) => match recognize_question(&value) {
                    Some(question) => {
                        tracing::info!(%attempt, "First question received");
                        return Ok(question);
                    }
                    None => {
                        let err = ChatError::Protocol("response does not contain question data".into());
                        tracing::warn!(%attempt, response = %value, "{err}");
                        attempts.push(AttemptFailure {
                            attempt,
                            reason: err.to_string(),
                        });
                    }
                },
                Err(err) => {
                    tracing::warn!(%attempt, error = %err, "Question retrieval failed");
                    attempts.push(AttemptFailure {
                        attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(ChatError::Bootstrap {
            agent_id: handle.agent_id().to_string(),
            attempts,
        })
    }
}
