//! 聊天记录：按到达顺序追加的消息日志，只用于显示与审计，不承载协议状态

use chrono::{DateTime, Local};
use serde::Serialize;

/// 发言方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Speaker {
    User,
    Agent,
}

/// 单条记录；创建后不再修改
#[derive(Clone, Debug, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub validation_note: Option<String>,
    pub at: DateTime<Local>,
}

impl TranscriptEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            validation_note: None,
            at: Local::now(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
            validation_note: None,
            at: Local::now(),
        }
    }

    pub fn with_validation_note(mut self, note: Option<String>) -> Self {
        self.validation_note = note;
        self
    }
}

/// 只追加的记录序列；仅在开始新会话时清空
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_arrival_order() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::agent("Benvenuto"));
        transcript.push(TranscriptEntry::agent("Come ti chiami?"));
        transcript.push(TranscriptEntry::user("Mario").with_validation_note(Some("ok".into())));

        let texts: Vec<_> = transcript.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Benvenuto", "Come ti chiami?", "Mario"]);
        assert_eq!(transcript.last().unwrap().speaker, Speaker::User);
        assert_eq!(
            transcript.last().unwrap().validation_note.as_deref(),
            Some("ok")
        );
    }

    #[test]
    fn test_clear_discards_previous_session() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::agent("old"));
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.len(), 0);
    }
}
