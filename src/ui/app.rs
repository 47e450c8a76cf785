//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx 与键盘事件，将按键转为 Command 发送给编排器，
//! 每帧用 draw 渲染 UiState 与本地视图状态（筛选、选中项、输入缓冲、滚动）。

use std::io::{self, Stdout};

use crossterm::event::{KeyCode, KeyEvent};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::core::{Command, UiPhase, UiState, View};
use crate::gateway::AgentInfo;
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::render::draw;

/// 名称或描述包含筛选词（不区分大小写）的代理
pub fn filter_agents<'a>(agents: &'a [AgentInfo], filter: &str) -> Vec<&'a AgentInfo> {
    let needle = filter.trim().to_lowercase();
    agents
        .iter()
        .filter(|agent| {
            needle.is_empty()
                || agent.name.to_lowercase().contains(&needle)
                || agent
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect()
}

/// 按键处理结果
#[derive(Debug, Clone)]
pub enum KeyAction {
    None,
    Send(Command),
}

/// 界面本地状态；不进入编排器
#[derive(Debug, Default)]
pub struct ViewState {
    pub filter: String,
    pub filtering: bool,
    pub selected: usize,
    pub input: String,
    pub scroll: usize,
    last_transcript_len: usize,
}

impl ViewState {
    /// 新记录到达时滚到底部
    pub fn sync(&mut self, state: &UiState) {
        if state.transcript.len() != self.last_transcript_len {
            self.last_transcript_len = state.transcript.len();
            self.scroll = usize::MAX;
        }
        let visible = filter_agents(&state.agents, &self.filter).len();
        self.selected = self.selected.min(visible.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent, state: &UiState) -> KeyAction {
        match state.view {
            View::AgentList => self.handle_list_key(key, state),
            View::Chat => self.handle_chat_key(key, state),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent, state: &UiState) -> KeyAction {
        if self.filtering {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.filtering = false,
                KeyCode::Backspace => {
                    self.filter.pop();
                    self.selected = 0;
                }
                KeyCode::Char(c) => {
                    self.filter.push(c);
                    self.selected = 0;
                }
                _ => {}
            }
            return KeyAction::None;
        }

        let visible = filter_agents(&state.agents, &self.filter);
        match key.code {
            KeyCode::Char('/') => self.filtering = true,
            KeyCode::Char('r') => return KeyAction::Send(Command::RefreshAgents),
            KeyCode::Esc => self.filter.clear(),
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                self.selected = (self.selected + 1).min(visible.len().saturating_sub(1))
            }
            KeyCode::Enter if state.phase != UiPhase::LoadingAgents => {
                if let Some(agent) = visible.get(self.selected) {
                    self.input.clear();
                    self.scroll = 0;
                    return KeyAction::Send(Command::StartChat((*agent).clone()));
                }
            }
            _ => {}
        }
        KeyAction::None
    }

    fn handle_chat_key(&mut self, key: KeyEvent, state: &UiState) -> KeyAction {
        match key.code {
            KeyCode::Esc => {
                self.input.clear();
                return KeyAction::Send(Command::Abandon);
            }
            KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
            KeyCode::End => self.scroll = usize::MAX,
            _ if !state.accepts_input() => {}
            KeyCode::Enter => {
                let answer = self.input.trim().to_string();
                if !answer.is_empty() {
                    self.input.clear();
                    return KeyAction::Send(Command::Submit(answer));
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        KeyAction::None
    }
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    mut state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut state_rx, EventHandler::new(cmd_tx)).await;

    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state_rx: &mut watch::Receiver<UiState>,
    events: EventHandler,
) -> anyhow::Result<()> {
    let mut view = ViewState::default();

    loop {
        let state = state_rx.borrow_and_update().clone();
        view.sync(&state);

        match events.poll()? {
            Some(AppEvent::Quit) => {
                events.send(Command::Quit);
                break;
            }
            Some(AppEvent::Key(key)) => {
                if let KeyAction::Send(cmd) = view.handle_key(key, &state) {
                    events.send(cmd);
                }
            }
            None => {}
        }

        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| draw(f, &state, &view, &mut scroll_info))?;
        let (total_lines, viewport_height) = scroll_info;
        view.scroll = view.scroll.min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn agent(id: &str, name: &str, description: Option<&str>) -> AgentInfo {
        AgentInfo {
            id: id.into(),
            name: name.into(),
            description: description.map(String::from),
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn list_state() -> UiState {
        UiState {
            agents: vec![
                agent("1", "Onboarding", Some("Nuovi dipendenti")),
                agent("2", "Offboarding", None),
                agent("3", "Change request", Some("richieste di modifica")),
            ],
            ..UiState::default()
        }
    }

    #[test]
    fn test_filter_matches_name_and_description() {
        let state = list_state();
        let names = |filter: &str| -> Vec<String> {
            filter_agents(&state.agents, filter)
                .into_iter()
                .map(|a| a.id.clone())
                .collect()
        };
        assert_eq!(names(""), vec!["1", "2", "3"]);
        assert_eq!(names("board"), vec!["1", "2"]);
        assert_eq!(names("MODIFICA"), vec!["3"]);
        assert!(names("zzz").is_empty());
    }

    #[test]
    fn test_enter_starts_chat_with_filtered_selection() {
        let state = list_state();
        let mut view = ViewState::default();

        for code in [KeyCode::Char('/'), KeyCode::Char('o'), KeyCode::Char('f'), KeyCode::Enter] {
            assert!(matches!(view.handle_key(key(code), &state), KeyAction::None));
        }
        assert_eq!(view.filter, "of");
        match view.handle_key(key(KeyCode::Enter), &state) {
            KeyAction::Send(Command::StartChat(agent)) => assert_eq!(agent.id, "2"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_chat_input_locked_while_submitting() {
        let mut state = UiState {
            view: View::Chat,
            phase: UiPhase::Submitting,
            input_locked: true,
            ..UiState::default()
        };
        let mut view = ViewState::default();

        view.handle_key(key(KeyCode::Char('x')), &state);
        assert!(view.input.is_empty());
        assert!(matches!(
            view.handle_key(key(KeyCode::Esc), &state),
            KeyAction::Send(Command::Abandon)
        ));

        state.phase = UiPhase::AwaitingAnswer;
        state.input_locked = false;
        for c in " Mario ".chars() {
            view.handle_key(key(KeyCode::Char(c)), &state);
        }
        match view.handle_key(key(KeyCode::Enter), &state) {
            KeyAction::Send(Command::Submit(answer)) => assert_eq!(answer, "Mario"),
            other => panic!("unexpected action {other:?}"),
        }
        assert!(view.input.is_empty());
    }

    #[test]
    fn test_blank_input_is_not_submitted() {
        let state = UiState {
            view: View::Chat,
            phase: UiPhase::AwaitingAnswer,
            ..UiState::default()
        };
        let mut view = ViewState::default();
        view.handle_key(key(KeyCode::Char(' ')), &state);
        assert!(matches!(
            view.handle_key(key(KeyCode::Enter), &state),
            KeyAction::None
        ));
    }
}
