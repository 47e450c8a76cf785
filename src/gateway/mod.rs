//! 远端代理网关：任务标签式请求/响应接口
//!
//! - **AgentGateway**: 聊天任务（Execute / GetAllSessions / RetrieveQuestion / ValidateAnswer），
//!   返回未经约束的 JSON，由 `types` 中的识别函数解释
//! - **AgentDirectory**: 管理任务（代理、问题、会话、回答的增删改查），薄封装
//! - **HttpGateway**: 基于 reqwest 的实现
//! - **MockGateway**: 可脚本化的内存实现（测试与本地演示用）

pub mod directory;
pub mod http;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use directory::{AdminQuestion, AgentDirectory, AgentInfo, AgentSession, QuestionDraft, SessionAnswer};
pub use http::HttpGateway;
pub use mock::{GatewayCall, MockGateway, SessionListing};
pub use types::{ChatTask, ServiceTask};

/// 网关传输层错误（网络、状态码、解码）
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Gateway rejected credentials (401)")]
    Unauthorized,

    #[error("Invalid JSON from gateway: {0}")]
    Decode(#[from] serde_json::Error),
}

/// 聊天相关的四个网关任务；会话地址统一以字符串传递（数字 id 或关联 id）
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// 请求创建会话；响应不保证包含数字会话 id
    async fn execute(
        &self,
        agent_id: &str,
        user_email: &str,
        session_name: &str,
        description: &str,
    ) -> Result<Value, GatewayError>;

    /// 列出代理的全部会话（期望为数组，实际可能不是）
    async fn get_all_sessions(&self, agent_id: &str) -> Result<Value, GatewayError>;

    /// 取当前问题
    async fn retrieve_question(&self, session: &str) -> Result<Value, GatewayError>;

    /// 提交回答并取得校验结果
    async fn validate_answer(&self, session: &str, answer: &str) -> Result<Value, GatewayError>;
}
