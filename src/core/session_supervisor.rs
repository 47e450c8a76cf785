//! 会话监管：运行时关闭与单次聊天的放弃
//!
//! 根 token 控制整个运行时；每次开聊从根 token 派生一个子 token，离开聊天视图时取消它。
//! 关闭运行时会连带取消进行中的聊天。

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct SessionSupervisor {
    shutdown: CancellationToken,
    chat: Option<CancellationToken>,
}

impl SessionSupervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            chat: None,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 开始新聊天：取消上一次（若有）并返回新的子 token
    pub fn begin_chat(&mut self) -> CancellationToken {
        self.abandon_chat();
        let token = self.shutdown.child_token();
        self.chat = Some(token.clone());
        token
    }

    /// 当前聊天的 token；没有聊天时返回根 token
    pub fn chat_token(&self) -> CancellationToken {
        self.chat
            .clone()
            .unwrap_or_else(|| self.shutdown.clone())
    }

    pub fn abandon_chat(&mut self) {
        if let Some(token) = self.chat.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_chat_cancels_previous() {
        let mut supervisor = SessionSupervisor::new(CancellationToken::new());
        let first = supervisor.begin_chat();
        let second = supervisor.begin_chat();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        supervisor.abandon_chat();
        assert!(second.is_cancelled());
        assert!(!supervisor.is_shutdown());
    }

    #[test]
    fn test_shutdown_reaches_chat_token() {
        let root = CancellationToken::new();
        let mut supervisor = SessionSupervisor::new(root.clone());
        let chat = supervisor.begin_chat();
        root.cancel();
        assert!(chat.is_cancelled());
        assert!(supervisor.is_shutdown());
    }
}
