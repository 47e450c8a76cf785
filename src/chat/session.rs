//! 会话身份：关联 id 与服务端数字 id
//!
//! 网关创建会话时不回传数字 id，只能先用客户端生成的关联 id 作为会话名，
//! 再从会话列表中找回数字 id。两者的优先规则只在 `SessionHandle::address` 一处定义。

use std::fmt;

use uuid::Uuid;

/// 客户端生成的关联 id（UUID v4 字符串），每次开聊生成一次，不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 寻址会话时实际使用的 id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAddress<'a> {
    Numeric(u64),
    Correlation(&'a CorrelationId),
}

impl fmt::Display for SessionAddress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionAddress::Numeric(id) => write!(f, "{id}"),
            SessionAddress::Correlation(cid) => write!(f, "{cid}"),
        }
    }
}

/// 进行中的聊天会话身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    correlation_id: CorrelationId,
    numeric_id: Option<u64>,
    agent_id: String,
    agent_display_name: String,
}

impl SessionHandle {
    pub fn new(
        correlation_id: CorrelationId,
        agent_id: impl Into<String>,
        agent_display_name: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            numeric_id: None,
            agent_id: agent_id.into(),
            agent_display_name: agent_display_name.into(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn numeric_id(&self) -> Option<u64> {
        self.numeric_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn agent_display_name(&self) -> &str {
        &self.agent_display_name
    }

    /// 只能设置一次；已设置时忽略并返回 false
    pub fn set_numeric_id(&mut self, id: u64) -> bool {
        match self.numeric_id {
            Some(existing) => {
                tracing::warn!(existing, rejected = id, "Numeric session id already resolved");
                false
            }
            None => {
                self.numeric_id = Some(id);
                true
            }
        }
    }

    /// 有数字 id 时用数字 id，否则回退到关联 id
    pub fn address(&self) -> SessionAddress<'_> {
        match self.numeric_id {
            Some(id) => SessionAddress::Numeric(id),
            None => SessionAddress::Correlation(&self.correlation_id),
        }
    }
}
