//! Извлечение человекочитаемых полей из payload возврата.
//!
//! Каждая функция перебирает упорядоченный список путей в `claim_data`,
//! `order_data`, `return_data` и возвращает первое непустое значение.
//! Ничего не паникует и не возвращает ошибок: при отсутствии данных
//! используется фиксированная строка.

use contracts::domain::a001_marketplace_return::{ReturnRecord, ReturnStatus, ReturnTexts};
use serde_json::Value;

use crate::shared::json_path::{array_at, first_text, text_at, truncate_with_ellipsis};

pub const CANCEL_REASON_FALLBACK: &str = "N/A";
pub const CANCELLED_WITHOUT_REASON: &str = "Cancelado - motivo não especificado";
pub const DETAILED_REASON_FALLBACK: &str = "Sem detalhes disponíveis";
pub const NO_MESSAGES: &str = "Nenhuma mensagem";
pub const UNKNOWN_SENDER: &str = "desconhecido";

/// Лимит превью сообщения в причине отмены и в переписке
pub const SHORT_PREVIEW_CHARS: usize = 100;
/// Лимит превью в детальной причине и последнем сообщении
pub const LONG_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy)]
enum Payload {
    Claim,
    Order,
    Return,
}

const CANCEL_REASON_PATHS: &[(Payload, &str)] = &[
    (Payload::Claim, "reason.description"),
    (Payload::Claim, "reason.name"),
    (Payload::Claim, "reason"),
    (Payload::Claim, "resolution.reason"),
    (Payload::Claim, "resolution.description"),
    (Payload::Claim, "cancel_reason"),
    (Payload::Claim, "description"),
    (Payload::Order, "cancel_detail.description"),
    (Payload::Order, "cancel_detail.reason"),
    (Payload::Order, "cancel_reason"),
    (Payload::Return, "reason"),
    (Payload::Return, "reason_description"),
];

const DETAILED_REASON_PATHS: &[(Payload, &str)] = &[
    (Payload::Claim, "reason.detail"),
    (Payload::Claim, "reason_detail"),
    (Payload::Claim, "resolution.details"),
    (Payload::Claim, "resolution.description"),
    (Payload::Claim, "description"),
    (Payload::Order, "cancel_detail.description"),
    (Payload::Return, "reason_detail"),
    (Payload::Return, "comments"),
];

/// Где в `messages_data` может лежать массив сообщений
const MESSAGE_LIST_PATHS: &[&str] = &["", "messages", "results", "data"];
const MESSAGE_TEXT_PATHS: &[&str] = &["text", "message", "content", "text.plain"];
const MESSAGE_SENDER_PATHS: &[&str] = &["from.role", "sender_role", "sender", "from"];

/// Сообщение переписки по возврату
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}

fn payload<'a>(record: &'a ReturnRecord, source: Payload) -> Option<&'a Value> {
    match source {
        Payload::Claim => record.claim_data.as_ref(),
        Payload::Order => record.order_data.as_ref(),
        Payload::Return => record.return_data.as_ref(),
    }
}

fn first_candidate(record: &ReturnRecord, candidates: &[(Payload, &str)]) -> Option<String> {
    candidates
        .iter()
        .find_map(|(source, path)| payload(record, *source).and_then(|root| text_at(root, path)))
}

/// Сообщения переписки в исходном порядке; сообщения без текста пропускаются
pub fn messages(record: &ReturnRecord) -> Vec<ChatMessage> {
    let Some(root) = record.messages_data.as_ref() else {
        return Vec::new();
    };
    let Some(items) = MESSAGE_LIST_PATHS
        .iter()
        .find_map(|path| array_at(root, path))
    else {
        tracing::debug!("Return {}: messages_data has no message list", record.id);
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let text = first_text(item, MESSAGE_TEXT_PATHS)?;
            let sender =
                first_text(item, MESSAGE_SENDER_PATHS).unwrap_or_else(|| UNKNOWN_SENDER.to_string());
            Some(ChatMessage { sender, text })
        })
        .collect()
}

fn last_message_text(record: &ReturnRecord) -> Option<String> {
    messages(record).pop().map(|m| m.text)
}

/// Причина отмены / возврата
pub fn extract_cancel_reason(record: &ReturnRecord) -> String {
    if let Some(reason) = first_candidate(record, CANCEL_REASON_PATHS) {
        return reason;
    }
    if let Some(text) = last_message_text(record) {
        return truncate_with_ellipsis(&text, SHORT_PREVIEW_CHARS);
    }
    tracing::debug!("Return {}: no cancel reason in payloads", record.id);
    if record.status == Some(ReturnStatus::Cancelled) {
        CANCELLED_WITHOUT_REASON.to_string()
    } else {
        CANCEL_REASON_FALLBACK.to_string()
    }
}

/// Подробная причина
pub fn extract_detailed_reason(record: &ReturnRecord) -> String {
    if let Some(detail) = first_candidate(record, DETAILED_REASON_PATHS) {
        return detail;
    }
    if let Some(text) = last_message_text(record) {
        return truncate_with_ellipsis(&text, LONG_PREVIEW_CHARS);
    }
    tracing::debug!("Return {}: no detailed reason in payloads", record.id);
    DETAILED_REASON_FALLBACK.to_string()
}

/// Переписка одной строкой на сообщение: "отправитель: текст"
pub fn extract_transcript(record: &ReturnRecord) -> String {
    let lines: Vec<String> = messages(record)
        .into_iter()
        .map(|m| format!("{}: {}", m.sender, truncate_with_ellipsis(&m.text, SHORT_PREVIEW_CHARS)))
        .collect();
    if lines.is_empty() {
        NO_MESSAGES.to_string()
    } else {
        lines.join("\n")
    }
}

pub fn extract_last_message(record: &ReturnRecord) -> String {
    last_message_text(record)
        .map(|text| truncate_with_ellipsis(&text, LONG_PREVIEW_CHARS))
        .unwrap_or_else(|| NO_MESSAGES.to_string())
}

/// Пустая или отсутствующая лента сообщений
pub fn has_empty_timeline(record: &ReturnRecord) -> bool {
    messages(record).is_empty()
}

pub fn extract_texts(record: &ReturnRecord) -> ReturnTexts {
    ReturnTexts {
        return_id: record.id.clone(),
        cancel_reason: extract_cancel_reason(record),
        detailed_reason: extract_detailed_reason(record),
        transcript: extract_transcript(record),
        last_message: extract_last_message(record),
    }
}
