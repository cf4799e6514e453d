use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Messages kept by [`MessageCenter`] before the oldest are dropped.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub severity: Severity,
    pub concise: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub fired_at: DateTime<Utc>,
}

impl Message {
    pub fn new(severity: Severity, concise: impl Into<String>) -> Self {
        Self {
            severity,
            concise: concise.into(),
            detail: None,
            fired_at: Utc::now(),
        }
    }

    pub fn info(concise: impl Into<String>) -> Self {
        Self::new(Severity::Info, concise)
    }

    pub fn warning(concise: impl Into<String>) -> Self {
        Self::new(Severity::Warning, concise)
    }

    pub fn error(concise: impl Into<String>) -> Self {
        Self::new(Severity::Error, concise)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Receives user-facing messages posted by navigation and error handling.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: Message);
}

/// Forwards messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: Message) {
        let detail = message.detail.as_deref().unwrap_or_default();
        match message.severity {
            Severity::Info => tracing::info!(detail, "{}", message.concise),
            Severity::Warning => tracing::warn!(detail, "{}", message.concise),
            Severity::Error | Severity::Fatal => tracing::error!(detail, "{}", message.concise),
        }
    }
}

/// Bounded in-memory history of posted messages, newest last.
#[derive(Debug)]
pub struct MessageCenter {
    capacity: usize,
    messages: Mutex<VecDeque<Message>>,
}

impl MessageCenter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        match self.messages.lock() {
            Ok(messages) => messages.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn latest(&self) -> Option<Message> {
        self.messages().pop()
    }

    pub fn clear(&self) {
        match self.messages.lock() {
            Ok(mut messages) => messages.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Default for MessageCenter {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_CAPACITY)
    }
}

impl NotificationSink for MessageCenter {
    fn notify(&self, message: Message) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        while messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_center_drops_oldest() {
        let center = MessageCenter::new(2);
        center.notify(Message::info("one"));
        center.notify(Message::warning("two"));
        center.notify(Message::error("three").with_detail("stack"));

        let concise: Vec<_> = center
            .messages()
            .into_iter()
            .map(|message| message.concise)
            .collect();
        assert_eq!(concise, vec!["two", "three"]);
        assert_eq!(center.latest().and_then(|message| message.detail).as_deref(), Some("stack"));

        center.clear();
        assert!(center.messages().is_empty());
    }

    #[test]
    fn tracing_sink_accepts_every_severity() {
        let sink = TracingSink;
        for severity in [Severity::Info, Severity::Warning, Severity::Error, Severity::Fatal] {
            sink.notify(Message::new(severity, "posted"));
        }
    }
}
