//! 身份提供者：为每个出站请求提供 Bearer token 与当前用户邮箱
//!
//! 以 trait 注入网关客户端，而不是读取进程级全局存储；token 失效（HTTP 401）时由客户端调用 invalidate。

use std::sync::RwLock;

use crate::config::AppConfig;

/// 出站调用所需的环境身份
pub trait IdentityProvider: Send + Sync {
    /// 当前 token；None 表示匿名请求（不带 Authorization 头）
    fn token(&self) -> Option<String>;

    /// 会话引导时发送的 user_email
    fn user_email(&self) -> String;

    /// 丢弃当前 token（服务端返回 401 后调用）
    fn invalidate(&self);
}

/// 基于配置的静态身份：token 来自 [auth].token，邮箱优先 [auth].user_email，否则用占位邮箱
#[derive(Debug)]
pub struct StaticIdentity {
    token: RwLock<Option<String>>,
    email: String,
}

impl StaticIdentity {
    pub fn new(token: Option<String>, email: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.trim().is_empty())),
            email: email.into(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let email = cfg
            .auth
            .user_email
            .clone()
            .unwrap_or_else(|| cfg.chat.placeholder_email.clone());
        Self::new(cfg.auth.token.clone(), email)
    }

    /// 匿名身份（无 token，占位邮箱），测试与本地调试用
    pub fn anonymous() -> Self {
        Self::new(None, AppConfig::default().chat.placeholder_email)
    }
}

impl IdentityProvider for StaticIdentity {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn user_email(&self) -> String {
        self.email.clone()
    }

    fn invalidate(&self) {
        if let Ok(mut token) = self.token.write() {
            if token.take().is_some() {
                tracing::warn!("Gateway rejected credentials, token discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_drops_token() {
        let identity = StaticIdentity::new(Some("secret".into()), "a@b.it");
        assert_eq!(identity.token().as_deref(), Some("secret"));
        identity.invalidate();
        assert!(identity.token().is_none());
        assert_eq!(identity.user_email(), "a@b.it");
    }

    #[test]
    fn test_blank_token_is_anonymous() {
        let identity = StaticIdentity::new(Some("  ".into()), "a@b.it");
        assert!(identity.token().is_none());
    }

    #[test]
    fn test_from_config_falls_back_to_placeholder_email() {
        let mut cfg = AppConfig::default();
        assert_eq!(StaticIdentity::from_config(&cfg).user_email(), "test@test.it");
        cfg.auth.user_email = Some("ops@example.com".into());
        assert_eq!(
            StaticIdentity::from_config(&cfg).user_email(),
            "ops@example.com"
        );
    }
}
