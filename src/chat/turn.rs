//! 轮次模型：当前问题、提交结果与状态机
//!
//! 状态转移是纯函数 `transition(phase, event)`，与网络时序无关，可单独测试；
//! 副作用（写记录、替换问题）由 `TurnEngine` 负责。

use serde::Serialize;

/// 当前问题；每轮替换，只保留一份
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Question {
    pub text: String,
    /// 自然语言描述的校验规则，由服务端评估，本地不解析
    pub validation_rule: String,
    /// 网关回答前是否会先查检索子系统
    pub requires_external_lookup: bool,
    pub id: Option<String>,
    pub order: Option<i64>,
}

impl Question {
    /// 写入记录的文本；只有 id 没有 domanda 的问题用占位文本，记录中不出现空消息
    pub fn display_text(&self) -> String {
        if !self.text.is_empty() {
            return self.text.clone();
        }
        match &self.id {
            Some(id) => format!("（问题 {id}）"),
            None => "（问题）".to_string(),
        }
    }
}

/// 提交回答后的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// 通过，并给出下一题
    NextQuestion {
        question: Question,
        note: Option<String>,
    },
    /// 通过，且没有更多问题
    Complete { note: Option<String> },
    /// 未通过；问题不变，用户需重答
    Rejected(String),
    /// 网关有响应但形状无法识别
    ProtocolError(String),
}

/// 轮次状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChatPhase {
    AwaitingAnswer,
    Submitting,
    Evaluating,
    Complete,
}

/// 驱动状态转移的事件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnEvent {
    /// 非空回答已接受，开始发送
    Submit,
    /// 网关返回了响应
    Responded,
    /// 传输失败（发送校验或追加取题时）
    TransportFailed,
    /// 响应已解释完毕
    Evaluated { complete: bool },
}

/// 转移表；未列出的组合保持原状态，Complete 为终态
pub fn transition(phase: ChatPhase, event: TurnEvent) -> ChatPhase {
    use ChatPhase::*;
    match (phase, event) {
        (Complete, _) => Complete,
        (AwaitingAnswer, TurnEvent::Submit) => Submitting,
        (Submitting, TurnEvent::Responded) => Evaluating,
        (Submitting | Evaluating, TurnEvent::TransportFailed) => AwaitingAnswer,
        (Evaluating, TurnEvent::Evaluated { complete: true }) => Complete,
        (Evaluating, TurnEvent::Evaluated { complete: false }) => AwaitingAnswer,
        (current, _) => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text_falls_back_for_id_only_question() {
        let mut question = Question {
            text: "Età?".into(),
            validation_rule: String::new(),
            requires_external_lookup: false,
            id: Some("5".into()),
            order: None,
        };
        assert_eq!(question.display_text(), "Età?");
        question.text.clear();
        assert_eq!(question.display_text(), "（问题 5）");
        question.id = None;
        assert!(!question.display_text().is_empty());
    }

    #[test]
    fn test_happy_path_transitions() {
        let phase = transition(ChatPhase::AwaitingAnswer, TurnEvent::Submit);
        assert_eq!(phase, ChatPhase::Submitting);
        let phase = transition(phase, TurnEvent::Responded);
        assert_eq!(phase, ChatPhase::Evaluating);
        assert_eq!(
            transition(phase, TurnEvent::Evaluated { complete: false }),
            ChatPhase::AwaitingAnswer
        );
        assert_eq!(
            transition(phase, TurnEvent::Evaluated { complete: true }),
            ChatPhase::Complete
        );
    }

    #[test]
    fn test_transport_failure_returns_to_awaiting() {
        assert_eq!(
            transition(ChatPhase::Submitting, TurnEvent::TransportFailed),
            ChatPhase::AwaitingAnswer
        );
        assert_eq!(
            transition(ChatPhase::Evaluating, TurnEvent::TransportFailed),
            ChatPhase::AwaitingAnswer
        );
    }

    #[test]
    fn test_complete_is_terminal() {
        for event in [
            TurnEvent::Submit,
            TurnEvent::Responded,
            TurnEvent::TransportFailed,
            TurnEvent::Evaluated { complete: false },
        ] {
            assert_eq!(transition(ChatPhase::Complete, event), ChatPhase::Complete);
        }
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        assert_eq!(
            transition(ChatPhase::AwaitingAnswer, TurnEvent::Responded),
            ChatPhase::AwaitingAnswer
        );
        assert_eq!(
            transition(ChatPhase::Submitting, TurnEvent::Submit),
            ChatPhase::Submitting
        );
    }
}
