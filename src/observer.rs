//! Injected diagnostics sink.
//!
//! Components report per-path and per-record outcomes through an [`Observer`]
//! handed to them by the caller instead of a process-wide logger. The CLI uses
//! [`TracingObserver`]; tests use [`MemoryObserver`] to assert on what was
//! reported.

use std::cell::RefCell;

/// Receiver for informational, warning and error events.
pub trait Observer {
    fn on_info(&self, message: &str);
    fn on_warning(&self, message: &str);
    fn on_error(&self, message: &str);
}

/// Forwards events to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn on_warning(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn on_error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: RefCell<Vec<(Level, String)>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Level, String)> {
        self.events.borrow().clone()
    }

    /// Messages recorded at `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages(Level::Warning)
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(Level::Error)
    }

    fn push(&self, level: Level, message: &str) {
        self.events.borrow_mut().push((level, message.to_string()));
    }
}

impl Observer for MemoryObserver {
    fn on_info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn on_warning(&self, message: &str) {
        self.push(Level::Warning, message);
    }

    fn on_error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}
