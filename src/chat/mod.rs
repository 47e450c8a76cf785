//! 聊天核心：会话引导与问答轮次
//!
//! - **SessionResolver**: 关联 id → Execute → 会话列表找回数字 id → 回退链取第一题
//! - **TurnEngine**: 提交回答、解释校验结果、前进或重答，直到完成
//! - **Transcript**: 只追加的聊天记录，供界面显示

pub mod engine;
pub mod error;
pub mod resolver;
pub mod session;
pub mod transcript;
pub mod turn;

pub use engine::{TurnEngine, TurnReport};
pub use error::{AttemptFailure, ChatError};
pub use resolver::{Bootstrap, SessionResolver};
pub use session::{CorrelationId, SessionAddress, SessionHandle};
pub use transcript::{Speaker, Transcript, TranscriptEntry};
pub use turn::{transition, ChatPhase, Question, TurnEvent, TurnOutcome};
