//! 事件处理
//!
//! 轮询 crossterm 键盘事件：Ctrl+Q 直接转为 Quit，其余按键交给 `ViewState::handle_key`，
//! 由它决定发往编排器的 Command。

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::core::Command;

/// 应用事件：退出或原始 KeyEvent
#[derive(Debug, Clone)]
pub enum AppEvent {
    Quit,
    Key(KeyEvent),
}

/// 事件处理器：持有 cmd_tx，poll 时读键盘并返回 AppEvent，send 转发命令
pub struct EventHandler {
    cmd_tx: mpsc::UnboundedSender<Command>,
    tick: Duration,
}

impl EventHandler {
    pub fn new(cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            cmd_tx,
            tick: Duration::from_millis(100),
        }
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(self.tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(classify(key)));
                }
            }
        }
        Ok(None)
    }

    pub fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::warn!("Runtime is gone, command dropped");
        }
    }
}

fn classify(key: KeyEvent) -> AppEvent {
    match key.code {
        KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => AppEvent::Quit,
        _ => AppEvent::Key(key),
    }
}
