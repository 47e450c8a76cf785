//! 轮次引擎：提交回答 → 校验 → 通过则前进、拒绝则重答，直到服务端表示没有更多问题
//!
//! 引擎独占当前会话身份与当前问题；聊天记录由调用方持有，引擎只追加。
//! 传输失败与无法识别的响应都在这里吸收：写一条记录、回到 AwaitingAnswer，不向外抛出。

use std::sync::Arc;

use crate::chat::error::ChatError;
use crate::chat::resolver::{Bootstrap, SessionResolver};
use crate::chat::session::SessionHandle;
use crate::chat::transcript::{Transcript, TranscriptEntry};
use crate::chat::turn::{transition, ChatPhase, Question, TurnEvent, TurnOutcome};
use crate::gateway::types::{interpret_follow_up, interpret_validation, FollowUp, ValidationVerdict};
use crate::gateway::AgentGateway;

pub const CLOSING_MESSAGE: &str = "所有问题都已完成，感谢你的参与！";
pub const SUBMISSION_FAILED_MESSAGE: &str = "提交回答时出错，请重试。";
pub const PROTOCOL_ERROR_MESSAGE: &str = "服务端返回了无法识别的响应，请重试。";

/// 一次 `submit_answer` 的结果
#[derive(Debug)]
pub enum TurnReport {
    /// 空回答或会话已结束，未发出任何请求
    Ignored,
    Outcome(TurnOutcome),
    /// 传输失败；已写入记录，问题不变
    Failed(ChatError),
}

pub struct TurnEngine {
    gateway: Arc<dyn AgentGateway>,
    handle: SessionHandle,
    question: Question,
    phase: ChatPhase,
}

impl TurnEngine {
    pub fn new(gateway: Arc<dyn AgentGateway>, bootstrap: Bootstrap) -> Self {
        Self {
            gateway,
            handle: bootstrap.handle,
            question: bootstrap.question,
            phase: ChatPhase::AwaitingAnswer,
        }
    }

    /// 开聊：引导会话并在成功时返回就绪的引擎，会话身份见 `handle()`
    pub async fn start_chat(
        resolver: &SessionResolver,
        gateway: Arc<dyn AgentGateway>,
        agent_id: &str,
        agent_name: &str,
        transcript: &mut Transcript,
    ) -> Result<Self, ChatError> {
        let bootstrap = resolver.resolve(agent_id, agent_name, transcript).await?;
        Ok(Self::new(gateway, bootstrap))
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == ChatPhase::Complete
    }

    /// 提交当前问题的回答。
    ///
    /// 空白回答在本地拦下：不发请求、不写记录。Complete 之后的调用同样是空操作。
    pub async fn submit_answer(&mut self, answer: &str, transcript: &mut Transcript) -> TurnReport {
        if self.is_complete() {
            tracing::debug!("Chat already complete, ignoring submission");
            return TurnReport::Ignored;
        }
        let answer = answer.trim();
        if answer.is_empty() {
            return TurnReport::Ignored;
        }

        self.phase = transition(self.phase, TurnEvent::Submit);
        let session = self.handle.address().to_string();
        tracing::info!(%session, "Submitting answer");

        let response = match self.gateway.validate_answer(&session, answer).await {
            Ok(value) => value,
            Err(err) => return self.transport_failed(ChatError::Submission(err), transcript),
        };
        self.phase = transition(self.phase, TurnEvent::Responded);
        tracing::debug!(%response, "Validation response");

        let outcome = match interpret_validation(&response) {
            ValidationVerdict::Rejected(reason) => TurnOutcome::Rejected(reason),
            ValidationVerdict::Unrecognized => {
                TurnOutcome::ProtocolError(format!("unrecognized validation response: {response}"))
            }
            // 校验响应里的 id 可能指回答记录，内嵌下一题必须带 domanda
            ValidationVerdict::Accepted {
                note,
                next: Some(question),
            } if !question.text.is_empty() => TurnOutcome::NextQuestion { question, note },
            ValidationVerdict::Accepted { note, .. } => {
                match self.gateway.retrieve_question(&session).await {
                    Ok(value) => match interpret_follow_up(&value) {
                        FollowUp::Next(question) => TurnOutcome::NextQuestion { question, note },
                        FollowUp::Complete => TurnOutcome::Complete { note },
                        FollowUp::Unrecognized => TurnOutcome::ProtocolError(format!(
                            "unrecognized follow-up response: {value}"
                        )),
                    },
                    Err(err) => {
                        return self.transport_failed(ChatError::Submission(err), transcript)
                    }
                }
            }
        };

        self.apply(&outcome, answer, transcript);
        TurnReport::Outcome(outcome)
    }

    fn transport_failed(&mut self, err: ChatError, transcript: &mut Transcript) -> TurnReport {
        tracing::warn!(error = %err, "Answer submission failed");
        transcript.push(TranscriptEntry::agent(SUBMISSION_FAILED_MESSAGE));
        self.phase = transition(self.phase, TurnEvent::TransportFailed);
        TurnReport::Failed(err)
    }

    fn apply(&mut self, outcome: &TurnOutcome, answer: &str, transcript: &mut Transcript) {
        let complete = match outcome {
            TurnOutcome::Rejected(reason) => {
                tracing::info!(%reason, "Answer rejected");
                transcript.push(TranscriptEntry::agent(reason.clone()));
                false
            }
            TurnOutcome::ProtocolError(reason) => {
                tracing::warn!(%reason, "Protocol error");
                transcript.push(TranscriptEntry::agent(PROTOCOL_ERROR_MESSAGE));
                false
            }
            TurnOutcome::NextQuestion { question, note } => {
                transcript.push(TranscriptEntry::user(answer).with_validation_note(note.clone()));
                transcript.push(TranscriptEntry::agent(question.display_text()));
                self.question = question.clone();
                false
            }
            TurnOutcome::Complete { note } => {
                tracing::info!(session = %self.handle.address(), "Chat complete");
                transcript.push(TranscriptEntry::user(answer).with_validation_note(note.clone()));
                transcript.push(TranscriptEntry::agent(CLOSING_MESSAGE));
                true
            }
        };
        self.phase = transition(self.phase, TurnEvent::Evaluated { complete });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::CorrelationId;
    use crate::chat::transcript::Speaker;
    use crate::gateway::{GatewayCall, MockGateway};
    use serde_json::json;

    fn question(text: &str) -> Question {
        Question {
            text: text.into(),
            validation_rule: "non vuoto".into(),
            requires_external_lookup: false,
            id: None,
            order: None,
        }
    }

    fn engine(gateway: Arc<MockGateway>, numeric_id: Option<u64>) -> TurnEngine {
        let mut handle = SessionHandle::new(CorrelationId::generate(), "42", "Onboarding");
        if let Some(id) = numeric_id {
            handle.set_numeric_id(id);
        }
        TurnEngine::new(
            gateway,
            Bootstrap {
                handle,
                question: question("Come ti chiami?"),
            },
        )
    }

    #[tokio::test]
    async fn test_blank_answer_is_ignored_locally() {
        let gateway = Arc::new(MockGateway::new());
        let mut engine = engine(gateway.clone(), Some(7));
        let mut transcript = Transcript::new();

        assert!(matches!(
            engine.submit_answer("   \n\t", &mut transcript).await,
            TurnReport::Ignored
        ));
        assert!(gateway.calls().is_empty());
        assert!(transcript.is_empty());
        assert_eq!(engine.phase(), ChatPhase::AwaitingAnswer);
    }

    #[tokio::test]
    async fn test_rejection_keeps_question_and_appends_reason() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate(json!({"esito": "KO", "validation": "Serve un nome completo"}));
        let mut engine = engine(gateway.clone(), Some(7));
        let before = engine.question().clone();
        let mut transcript = Transcript::new();

        let report = engine.submit_answer("  M ", &mut transcript).await;
        assert!(matches!(
            report,
            TurnReport::Outcome(TurnOutcome::Rejected(ref r)) if r == "Serve un nome completo"
        ));
        assert_eq!(engine.question(), &before);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].speaker, Speaker::Agent);
        assert_eq!(engine.phase(), ChatPhase::AwaitingAnswer);
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::ValidateAnswer {
                session: "7".into(),
                answer: "M".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_embedded_next_question_advances_without_follow_up() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate(json!({
            "esito": "OK",
            "validation": "Nome valido",
            "domanda": "Quanti anni hai?",
            "validazione": "un numero"
        }));
        let mut engine = engine(gateway.clone(), Some(7));
        let mut transcript = Transcript::new();

        engine.submit_answer("Mario Rossi", &mut transcript).await;

        assert_eq!(engine.question().text, "Quanti anni hai?");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.entries()[0].speaker, Speaker::User);
        assert_eq!(transcript.entries()[0].text, "Mario Rossi");
        assert_eq!(
            transcript.entries()[0].validation_note.as_deref(),
            Some("Nome valido")
        );
        assert_eq!(transcript.entries()[1].text, "Quanti anni hai?");
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_retrieval_supplies_next_question() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate(json!({"esito": "OK", "validation": "ok", "session": "7"}));
        gateway.push_retrieve(json!([{"id": 2, "domanda": "Dove abiti?"}]));
        let mut engine = engine(gateway.clone(), None);
        let cid = engine.handle().correlation_id().to_string();
        let mut transcript = Transcript::new();

        let report = engine.submit_answer("Mario", &mut transcript).await;

        assert!(matches!(
            report,
            TurnReport::Outcome(TurnOutcome::NextQuestion { .. })
        ));
        assert_eq!(engine.question().text, "Dove abiti?");
        assert_eq!(transcript.len(), 2);
        // 没有数字 id 时始终使用关联 id
        assert_eq!(gateway.session_addresses(), vec![cid.clone(), cid]);
    }

    #[tokio::test]
    async fn test_id_only_follow_up_question_is_rendered() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate(json!({"esito": "OK", "validation": "ok", "id": 11}));
        gateway.push_retrieve(json!([{"id": 3, "validazione": "una data"}]));
        let mut engine = engine(gateway.clone(), Some(7));
        let mut transcript = Transcript::new();

        let report = engine.submit_answer("Mario", &mut transcript).await;

        assert!(matches!(
            report,
            TurnReport::Outcome(TurnOutcome::NextQuestion { .. })
        ));
        // 只有 id 的内嵌记录不当作下一题，仍走追加取题
        assert_eq!(gateway.calls().len(), 2);
        assert_eq!(engine.question().id.as_deref(), Some("3"));
        assert_eq!(engine.question().validation_rule, "una data");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.entries()[1].speaker, Speaker::Agent);
        assert_eq!(transcript.entries()[1].text, "（问题 3）");
    }

    #[tokio::test]
    async fn test_completion_is_terminal() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate(json!({"esito": "OK", "validation": "ok"}));
        gateway.push_retrieve(json!({"response": "Tutte le domande completate"}));
        let mut engine = engine(gateway.clone(), Some(7));
        let mut transcript = Transcript::new();

        let report = engine.submit_answer("Mario", &mut transcript).await;
        assert!(matches!(
            report,
            TurnReport::Outcome(TurnOutcome::Complete { .. })
        ));
        assert!(engine.is_complete());
        assert_eq!(transcript.last().unwrap().text, CLOSING_MESSAGE);

        let len = transcript.len();
        let calls = gateway.calls().len();
        assert!(matches!(
            engine.submit_answer("ancora", &mut transcript).await,
            TurnReport::Ignored
        ));
        assert_eq!(transcript.len(), len);
        assert_eq!(gateway.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_unrecognized_validation_is_protocol_error() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate(json!({"message": "Workflow was started"}));
        let mut engine = engine(gateway.clone(), Some(7));
        let mut transcript = Transcript::new();

        let report = engine.submit_answer("Mario", &mut transcript).await;
        assert!(matches!(
            report,
            TurnReport::Outcome(TurnOutcome::ProtocolError(_))
        ));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].text, PROTOCOL_ERROR_MESSAGE);
        assert_eq!(engine.question().text, "Come ti chiami?");
        assert_eq!(engine.phase(), ChatPhase::AwaitingAnswer);
    }

    #[tokio::test]
    async fn test_unrecognized_follow_up_is_protocol_error() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate(json!({"esito": "OK"}));
        gateway.push_retrieve(json!({"error": "boom"}));
        let mut engine = engine(gateway.clone(), Some(7));
        let mut transcript = Transcript::new();

        let report = engine.submit_answer("Mario", &mut transcript).await;
        assert!(matches!(
            report,
            TurnReport::Outcome(TurnOutcome::ProtocolError(_))
        ));
        assert!(!engine.is_complete());
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_absorbed() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_validate_error("connection refused");
        gateway.push_validate(json!({"esito": "KO", "validation": "Riprova"}));
        let mut engine = engine(gateway.clone(), Some(7));
        let mut transcript = Transcript::new();

        let report = engine.submit_answer("Mario", &mut transcript).await;
        assert!(matches!(
            report,
            TurnReport::Failed(ChatError::Submission(_))
        ));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].text, SUBMISSION_FAILED_MESSAGE);
        assert_eq!(engine.phase(), ChatPhase::AwaitingAnswer);
        assert_eq!(engine.question().text, "Come ti chiami?");

        // 用户手动重试，引擎照常工作
        engine.submit_answer("Mario", &mut transcript).await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(gateway.session_addresses(), vec!["7", "7"]);
    }
}
