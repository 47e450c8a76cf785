//! 基于 reqwest 的网关客户端
//!
//! 两个 webhook 端点：executeagent（聊天任务）与 AgentsServices（管理任务）。
//! 每个请求从 IdentityProvider 取 Bearer token；401 时让身份失效。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::GatewaySection;
use crate::gateway::types::{ChatTask, ServiceTask};
use crate::gateway::{AgentGateway, GatewayError};
use crate::identity::IdentityProvider;

/// HTTP 网关：持有 reqwest Client、两个端点 URL 与注入的身份
pub struct HttpGateway {
    client: Client,
    execute_url: String,
    services_url: String,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpGateway {
    pub fn new(
        cfg: &GatewaySection,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if cfg.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.timeout_secs));
        }
        Ok(Self {
            client: builder.build()?,
            execute_url: cfg.execute_url(),
            services_url: cfg.services_url(),
            identity,
        })
    }

    pub(crate) async fn post_chat(&self, task: &ChatTask<'_>) -> Result<Value, GatewayError> {
        self.post(&self.execute_url, task).await
    }

    pub(crate) async fn post_service(&self, task: &ServiceTask<'_>) -> Result<Value, GatewayError> {
        self.post(&self.services_url, task).await
    }

    async fn post<T: Serialize + std::fmt::Debug>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Value, GatewayError> {
        tracing::debug!(url, ?body, "Gateway request");
        let mut request = self.client.post(url).json(body);
        if let Some(token) = self.identity.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.identity.invalidate();
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // webhook 在没有数据时可能返回空 body
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&text)?;
        tracing::debug!(url, response = %value, "Gateway response");
        Ok(value)
    }
}

#[async_trait]
impl AgentGateway for HttpGateway {
    async fn execute(
        &self,
        agent_id: &str,
        user_email: &str,
        session_name: &str,
        description: &str,
    ) -> Result<Value, GatewayError> {
        self.post_chat(&ChatTask::Execute {
            agent_id,
            user_email,
            session_name,
            description,
        })
        .await
    }

    async fn get_all_sessions(&self, agent_id: &str) -> Result<Value, GatewayError> {
        self.post_service(&ServiceTask::GetAllSessions { agent_id }).await
    }

    async fn retrieve_question(&self, session: &str) -> Result<Value, GatewayError> {
        self.post_chat(&ChatTask::RetrieveQuestion { session }).await
    }

    async fn validate_answer(&self, session: &str, answer: &str) -> Result<Value, GatewayError> {
        self.post_chat(&ChatTask::ValidateAnswer {
            session,
            risposta: answer,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;

    #[test]
    fn test_new_builds_endpoint_urls() {
        let cfg = GatewaySection {
            base_url: "https://n8n.example.com/".into(),
            timeout_secs: 5,
            ..GatewaySection::default()
        };
        let gateway = HttpGateway::new(&cfg, Arc::new(StaticIdentity::anonymous())).unwrap();
        assert_eq!(gateway.execute_url, "https://n8n.example.com/webhook/executeagent");
        assert_eq!(gateway.services_url, "https://n8n.example.com/webhook/AgentsServices");
    }
}
