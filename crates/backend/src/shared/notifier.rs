use contracts::shared::notification::{Notification, NotificationLevel};
use std::sync::{Mutex, PoisonError};

use crate::shared::logger;

/// Поверхность уведомлений пользователя
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    /// Забрать накопленные уведомления (если реализация их хранит)
    fn drain(&self) -> Vec<Notification> {
        Vec::new()
    }
}

/// Уведомления сессии: tracing + system_log + буфер для HTTP API
pub struct LogNotifier {
    session_id: String,
    buffer: Mutex<Vec<Notification>>,
}

/// Больше не храним: старые уведомления вытесняются
const BUFFER_LIMIT: usize = 200;

impl LogNotifier {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            buffer: Mutex::new(Vec::new()),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(
                "[{}] {}: {}",
                self.session_id,
                notification.category,
                notification.message
            ),
            NotificationLevel::Warning => tracing::warn!(
                "[{}] {}: {}",
                self.session_id,
                notification.category,
                notification.message
            ),
            NotificationLevel::Error => tracing::error!(
                "[{}] {}: {}",
                self.session_id,
                notification.category,
                notification.message
            ),
        }
        logger::log(&notification.category, &notification.message);

        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() >= BUFFER_LIMIT {
            buffer.remove(0);
        }
        buffer.push(notification);
    }

    fn drain(&self) -> Vec<Notification> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buffer)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_notifier_buffers_and_drains() {
        let notifier = LogNotifier::new("s-1");
        notifier.notify(Notification::success("enrichment", "ok"));
        notifier.notify(Notification::error("enrichment", "falhou"));

        let drained = notifier.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].level, NotificationLevel::Error);
        assert!(notifier.drain().is_empty());
    }

    #[test]
    fn test_log_notifier_buffer_is_bounded() {
        let notifier = LogNotifier::new("s-1");
        for i in 0..(BUFFER_LIMIT + 5) {
            notifier.notify(Notification::warning("test", format!("n{i}")));
        }
        let drained = notifier.drain();
        assert_eq!(drained.len(), BUFFER_LIMIT);
        assert_eq!(drained[0].message, "n5");
    }
}
