//! 界面渲染
//!
//! 代理列表视图：筛选栏 + 列表（高亮选中项）。聊天视图：标题栏显示代理与阶段，
//! 主体为聊天记录（按发言方着色、按宽度换行），底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
    Frame,
};

use crate::chat::Speaker;
use crate::core::{UiPhase, UiState, View};
use crate::ui::app::{filter_agents, ViewState};

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn phase_label(phase: UiPhase) -> &'static str {
    match phase {
        UiPhase::Idle => "空闲",
        UiPhase::LoadingAgents => "加载中…",
        UiPhase::Bootstrapping => "初始化…",
        UiPhase::AwaitingAnswer => "等待回答",
        UiPhase::Submitting => "校验中…",
        UiPhase::Complete => "已完成",
        UiPhase::BootstrapFailed => "初始化失败",
    }
}

/// 绘制一帧；聊天视图将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(f: &mut Frame, state: &UiState, view: &ViewState, out: &mut (usize, usize)) {
    match state.view {
        View::AgentList => draw_agent_list(f, state, view),
        View::Chat => draw_chat(f, state, view, out),
    }
}

fn draw_agent_list(f: &mut Frame, state: &UiState, view: &ViewState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    let filter_title = if view.filtering { " 筛选（Enter 完成） " } else { " 筛选（/） " };
    let filter = Paragraph::new(view.filter.as_str()).block(
        Block::default()
            .title(filter_title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if view.filtering {
                Color::Yellow
            } else {
                Color::DarkGray
            })),
    );
    f.render_widget(filter, chunks[0]);

    let agents = filter_agents(&state.agents, &view.filter);
    let items: Vec<ListItem> = agents
        .iter()
        .map(|agent| {
            let mut spans = vec![Span::styled(
                agent.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if let Some(description) = agent.description.as_deref().filter(|d| !d.is_empty()) {
                spans.push(Span::styled(
                    format!("  {description}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(" ChangeOps │ 代理 {} │ {} ", agents.len(), phase_label(state.phase));
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("› ");
    let mut list_state = ListState::default();
    if !agents.is_empty() {
        list_state.select(Some(view.selected));
    }
    f.render_stateful_widget(list, chunks[1], &mut list_state);

    draw_status(f, state, chunks[2], " Enter 开聊 │ / 筛选 │ r 刷新 │ Ctrl+Q 退出 ");
}

fn draw_chat(f: &mut Frame, state: &UiState, view: &ViewState, out: &mut (usize, usize)) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3), Constraint::Length(1)])
        .split(f.area());

    let conv_area = chunks[0];
    let content_width = conv_area.width.saturating_sub(2).saturating_sub(1) as usize; // 边框 + 滚动条

    let agent_name = state.agent_name.as_deref().unwrap_or("-");
    let title = format!(" {} │ {} ", agent_name, phase_label(state.phase));
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    // 每条记录按宽度换行；校验说明跟在回答下方；记录之间加空行
    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, entry) in state.transcript.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        let (prefix, color) = match entry.speaker {
            Speaker::User => ("你   ", Color::Cyan),
            Speaker::Agent => ("代理 ", Color::Green),
        };
        let stamp = entry.at.format("%H:%M").to_string();
        for (i, line) in wrap_text(&entry.text, content_width.saturating_sub(6).max(20))
            .into_iter()
            .enumerate()
        {
            let pref = if i == 0 { prefix } else { "     " };
            let mut spans = vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(line),
            ];
            if i == 0 {
                spans.push(Span::styled(
                    format!("  {stamp}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            text_lines.push(Line::from(spans));
        }
        if let Some(note) = &entry.validation_note {
            text_lines.push(Line::from(Span::styled(
                format!("     ✓ {note}"),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let content_height = conv_area.height.saturating_sub(2) as usize; // 边框
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = view.scroll.min(max_scroll);

    let paragraph = Paragraph::new(Text::from(text_lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, conv_area);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, conv_area, &mut scrollbar_state);
    }

    let input_title = match state.phase {
        UiPhase::Complete => " 会话已结束 ".to_string(),
        UiPhase::BootstrapFailed => " 无法开始会话（Esc 返回） ".to_string(),
        _ if state.input_locked => " 等待回复… ".to_string(),
        _ => match &state.current_question {
            Some(q) if !q.validation_rule.is_empty() => {
                format!(" 回答（{}） ", q.validation_rule.chars().take(40).collect::<String>())
            }
            _ => " 回答 ".to_string(),
        },
    };
    let input = Paragraph::new(view.input.as_str())
        .block(
            Block::default()
                .title(input_title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .style(if state.accepts_input() {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        });
    f.render_widget(input, chunks[1]);

    draw_status(f, state, chunks[2], " Enter 发送 │ ↑↓ PgUp/PgDn 滚动 │ Esc 返回 │ Ctrl+Q 退出 ");

    out.0 = total_lines;
    out.1 = content_height;
}

/// 底部状态行：错误优先，其次加载提示，否则显示快捷键
fn draw_status(f: &mut Frame, state: &UiState, area: Rect, hint: &str) {
    let line = if let Some(err) = &state.error_message {
        Line::from(Span::styled(
            format!(" 错误: {err}"),
            Style::default().fg(Color::Red),
        ))
    } else if let Some(loading) = &state.loading_message {
        Line::from(Span::styled(
            format!(" {loading}"),
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from(Span::styled(hint.to_string(), Style::default().fg(Color::DarkGray)))
    };
    f.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_counts_chars_not_bytes() {
        let lines = wrap_text("回答未通过校验", 3);
        assert_eq!(lines, vec!["回答未", "通过校", "验"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
    }
}
