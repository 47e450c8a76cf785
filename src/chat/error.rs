//! 聊天错误类型
//!
//! Bootstrap 会终止开聊并展示给用户；Submission 与 Protocol 由轮次引擎就地吸收（写入记录），
//! 不会越过引擎边界。校验未通过不是错误，见 `TurnOutcome::Rejected`。

use std::fmt;

use thiserror::Error;

use crate::gateway::GatewayError;

/// 会话引导中一次失败的尝试
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// 尝试内容，如 "RetrieveQuestion via numeric id 7"
    pub attempt: String,
    pub reason: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attempt, self.reason)
    }
}

fn join_attempts(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No question received from agent {agent_id}: {}", join_attempts(.attempts))]
    Bootstrap {
        agent_id: String,
        attempts: Vec<AttemptFailure>,
    },

    #[error("Failed to submit answer: {0}")]
    Submission(#[from] GatewayError),

    #[error("Unrecognized gateway response: {0}")]
    Protocol(String),
}
