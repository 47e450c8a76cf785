//! 网关线协议：任务请求体与响应识别
//!
//! 请求体是以 `task` 字段打标签的 JSON 对象；响应是形状不稳定的 JSON，
//! 这里只做「能否识别」的判断，不做严格反序列化。

use serde::Serialize;
use serde_json::Value;

use crate::chat::Question;

/// executeagent 端点上的聊天任务
#[derive(Debug, Serialize)]
#[serde(tag = "task")]
pub enum ChatTask<'a> {
    Execute {
        agent_id: &'a str,
        user_email: &'a str,
        session_name: &'a str,
        description: &'a str,
    },
    RetrieveQuestion {
        session: &'a str,
    },
    ValidateAnswer {
        session: &'a str,
        risposta: &'a str,
    },
}

/// AgentsServices 端点上的管理任务；布尔值与序号按服务端约定以字符串发送
#[derive(Debug, Serialize)]
#[serde(tag = "task")]
pub enum ServiceTask<'a> {
    GetAllAgents,
    GetAllQuestions {
        agent: &'a str,
    },
    AddQuestion {
        agent: &'a str,
        domanda: &'a str,
        validazione: &'a str,
        is_rag_required: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        order: Option<String>,
    },
    UpdateQuestion {
        id: &'a str,
        agent: &'a str,
        domanda: &'a str,
        validazione: &'a str,
        is_rag_required: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        order: Option<String>,
    },
    DeleteQuestion {
        id: &'a str,
    },
    CreateAgent {
        agent: &'a str,
        description: &'a str,
    },
    UpdateAgent {
        agent_id: &'a str,
        agent_name: &'a str,
        description: &'a str,
    },
    DeleteAgent {
        agent_id: &'a str,
    },
    GetAllSessions {
        agent_id: &'a str,
    },
    GetAllAnswers {
        session: &'a str,
    },
    DeleteAnswer {
        answer_id: &'a str,
    },
    DeleteSession {
        session_id: &'a str,
    },
}

/// 按 JS 语义判断「真值」：null/false/0/"" 为假
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 数字或字符串形式的 id 统一成字符串
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 数字或数字字符串形式的会话 id
pub(crate) fn numeric_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 布尔字段可能是 true / "true" / 1
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s == "1",
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// webhook 常把单个结果包在一元素数组里
fn unwrap_single(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

/// 响应是否「可识别为问题」：含问题文本字段（domanda）或 id 字段
pub fn recognize_question(value: &Value) -> Option<Question> {
    let obj = unwrap_single(value).as_object()?;
    let text = obj.get("domanda").filter(|v| is_truthy(v));
    let id = obj.get("id").filter(|v| is_truthy(v));
    if text.is_none() && id.is_none() {
        return None;
    }
    Some(Question {
        text: text
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        validation_rule: obj
            .get("validazione")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        requires_external_lookup: flag(obj.get("is_rag_required")),
        id: id.and_then(id_string),
        order: obj.get("ordine").and_then(Value::as_i64),
    })
}

/// ValidateAnswer 响应的解释结果
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationVerdict {
    /// esito = OK；note 为服务端的校验说明，next 为响应中内嵌的下一题（若有）
    Accepted {
        note: Option<String>,
        next: Option<Question>,
    },
    /// esito = KO；附拒绝原因
    Rejected(String),
    /// 形状无法识别
    Unrecognized,
}

/// 拒绝但未给原因时的默认说明
pub const DEFAULT_REJECTION: &str = "回答未通过校验，请重试。";

pub fn interpret_validation(value: &Value) -> ValidationVerdict {
    let Some(obj) = unwrap_single(value).as_object() else {
        return ValidationVerdict::Unrecognized;
    };
    let note = obj
        .get("validation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    match obj.get("esito").and_then(Value::as_str).map(str::trim) {
        Some(esito) if esito.eq_ignore_ascii_case("OK") => ValidationVerdict::Accepted {
            note,
            next: recognize_question(value),
        },
        Some(esito) if esito.eq_ignore_ascii_case("KO") => {
            ValidationVerdict::Rejected(note.unwrap_or_else(|| DEFAULT_REJECTION.to_string()))
        }
        _ => ValidationVerdict::Unrecognized,
    }
}

/// 校验通过后追加 RetrieveQuestion 的解释结果
#[derive(Debug, Clone, PartialEq)]
pub enum FollowUp {
    Next(Question),
    /// 服务端表示没有更多问题
    Complete,
    Unrecognized,
}

/// 「没有更多问题」的形状：空响应、空对象/数组，或只带 response 文本的对象
pub fn interpret_follow_up(value: &Value) -> FollowUp {
    if let Some(question) = recognize_question(value) {
        return FollowUp::Next(question);
    }
    match value {
        Value::Null => FollowUp::Complete,
        Value::String(s) if s.trim().is_empty() => FollowUp::Complete,
        Value::Array(items) if items.is_empty() => FollowUp::Complete,
        Value::Object(obj) if obj.is_empty() || obj.contains_key("response") => FollowUp::Complete,
        Value::Array(items) if items.len() == 1 => match &items[0] {
            Value::Object(obj) if obj.is_empty() || obj.contains_key("response") => {
                FollowUp::Complete
            }
            _ => FollowUp::Unrecognized,
        },
        _ => FollowUp::Unrecognized,
    }
}

/// 会话列表中按名称查找的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLookup {
    Found(u64),
    NotFound,
    NotAnArray,
}

/// 线性扫描会话列表，找到 nome 等于 name 的记录并取其数字 id；id 为 0 视为未分配
pub fn find_session_id(listing: &Value, name: &str) -> SessionLookup {
    let Some(items) = listing.as_array() else {
        return SessionLookup::NotAnArray;
    };
    items
        .iter()
        .find(|item| item.get("nome").and_then(Value::as_str) == Some(name))
        .and_then(|item| item.get("id"))
        .filter(|id| is_truthy(id))
        .and_then(numeric_id)
        .filter(|id| *id != 0)
        .map(SessionLookup::Found)
        .unwrap_or(SessionLookup::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_task_is_tagged() {
        let body = serde_json::to_value(ChatTask::Execute {
            agent_id: "42",
            user_email: "test@test.it",
            session_name: "abc",
            description: "nuova chat",
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "task": "Execute",
                "agent_id": "42",
                "user_email": "test@test.it",
                "session_name": "abc",
                "description": "nuova chat"
            })
        );

        let body = serde_json::to_value(ChatTask::ValidateAnswer {
            session: "7",
            risposta: "yes",
        })
        .unwrap();
        assert_eq!(body, json!({"task": "ValidateAnswer", "session": "7", "risposta": "yes"}));
    }

    #[test]
    fn test_service_task_unit_and_optional_order() {
        let body = serde_json::to_value(ServiceTask::GetAllAgents).unwrap();
        assert_eq!(body, json!({"task": "GetAllAgents"}));

        let body = serde_json::to_value(ServiceTask::AddQuestion {
            agent: "1",
            domanda: "Nome?",
            validazione: "non vuoto",
            is_rag_required: "false".into(),
            order: None,
        })
        .unwrap();
        assert!(body.get("order").is_none());
        assert_eq!(body["is_rag_required"], "false");
    }

    #[test]
    fn test_recognize_question_by_text_or_id() {
        let q = recognize_question(&json!({
            "domanda": "Come ti chiami?",
            "validazione": "deve essere un nome",
            "is_rag_required": "true",
            "ordine": 2
        }))
        .unwrap();
        assert_eq!(q.text, "Come ti chiami?");
        assert_eq!(q.validation_rule, "deve essere un nome");
        assert!(q.requires_external_lookup);
        assert_eq!(q.order, Some(2));

        let q = recognize_question(&json!({"id": 12})).unwrap();
        assert_eq!(q.id.as_deref(), Some("12"));
        assert!(q.text.is_empty());

        assert!(recognize_question(&json!({"domanda": ""})).is_none());
        assert!(recognize_question(&json!({"foo": "bar"})).is_none());
        assert!(recognize_question(&json!("Come ti chiami?")).is_none());
        assert!(recognize_question(&Value::Null).is_none());
    }

    #[test]
    fn test_recognize_question_unwraps_single_item_array() {
        let q = recognize_question(&json!([{"domanda": "Età?"}])).unwrap();
        assert_eq!(q.text, "Età?");
        assert!(recognize_question(&json!([{"domanda": "a"}, {"domanda": "b"}])).is_none());
    }

    #[test]
    fn test_interpret_validation() {
        assert_eq!(
            interpret_validation(&json!({"esito": "KO", "validation": "Serve un numero", "session": "7"})),
            ValidationVerdict::Rejected("Serve un numero".into())
        );
        assert_eq!(
            interpret_validation(&json!({"esito": "KO"})),
            ValidationVerdict::Rejected(DEFAULT_REJECTION.into())
        );
        assert_eq!(
            interpret_validation(&json!({"esito": "OK", "validation": "ok", "session": "7"})),
            ValidationVerdict::Accepted {
                note: Some("ok".into()),
                next: None
            }
        );
        match interpret_validation(&json!({"esito": "ok", "domanda": "Prossima?"})) {
            ValidationVerdict::Accepted { next: Some(q), note: None } => {
                assert_eq!(q.text, "Prossima?")
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
        assert_eq!(
            interpret_validation(&json!({"result": "fine"})),
            ValidationVerdict::Unrecognized
        );
        assert_eq!(interpret_validation(&json!(42)), ValidationVerdict::Unrecognized);
    }

    #[test]
    fn test_interpret_follow_up() {
        assert!(matches!(
            interpret_follow_up(&json!({"domanda": "Q2"})),
            FollowUp::Next(_)
        ));
        assert_eq!(interpret_follow_up(&Value::Null), FollowUp::Complete);
        assert_eq!(interpret_follow_up(&json!({})), FollowUp::Complete);
        assert_eq!(interpret_follow_up(&json!([])), FollowUp::Complete);
        assert_eq!(interpret_follow_up(&json!("")), FollowUp::Complete);
        assert_eq!(
            interpret_follow_up(&json!({"response": "Tutte le domande completate"})),
            FollowUp::Complete
        );
        assert_eq!(interpret_follow_up(&json!([{}])), FollowUp::Complete);
        assert_eq!(interpret_follow_up(&json!({"error": "boom"})), FollowUp::Unrecognized);
        assert_eq!(interpret_follow_up(&json!(3)), FollowUp::Unrecognized);
    }

    #[test]
    fn test_find_session_id() {
        let listing = json!([
            {"id": 3, "nome": "other"},
            {"id": 7, "nome": "abc-123"}
        ]);
        assert_eq!(find_session_id(&listing, "abc-123"), SessionLookup::Found(7));
        assert_eq!(find_session_id(&listing, "zzz"), SessionLookup::NotFound);
        assert_eq!(find_session_id(&json!({}), "abc-123"), SessionLookup::NotAnArray);
        assert_eq!(
            find_session_id(&json!([{"id": "9", "nome": "n"}]), "n"),
            SessionLookup::Found(9)
        );
    }

    #[test]
    fn test_zero_session_id_is_not_resolved() {
        let listing = json!([{"id": 0, "nome": "abc-123"}]);
        assert_eq!(find_session_id(&listing, "abc-123"), SessionLookup::NotFound);
        let listing = json!([{"id": "0", "nome": "abc-123"}]);
        assert_eq!(find_session_id(&listing, "abc-123"), SessionLookup::NotFound);
        let listing = json!([{"id": "", "nome": "abc-123"}]);
        assert_eq!(find_session_id(&listing, "abc-123"), SessionLookup::NotFound);
    }

    #[test]
    fn test_truthiness_follows_js_rules() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!({})));
    }
}
