use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub level: ProgressLevel,
    pub stage: String,
    pub message: String,
}

impl ProgressEvent {
    pub fn info(stage: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ProgressLevel::Info, stage, message)
    }

    pub fn warn(stage: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ProgressLevel::Warn, stage, message)
    }

    pub fn error(stage: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ProgressLevel::Error, stage, message)
    }

    fn new(level: ProgressLevel, stage: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            level,
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        let stage = event.stage.as_str();
        match event.level {
            ProgressLevel::Info => tracing::info!(stage, "{}", event.message),
            ProgressLevel::Warn => tracing::warn!(stage, "{}", event.message),
            ProgressLevel::Error => tracing::error!(stage, "{}", event.message),
        }
    }
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
