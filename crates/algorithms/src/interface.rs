//! Host interface consumed by editing operations.
//!
//! Notifications and map refreshes go through [`Interface`] so operations
//! can run inside a desktop host, a CLI or a test harness alike.

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Critical,
}

/// A notification for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// User-facing surface of the host application.
pub trait Interface {
    /// Show a notification to the user
    fn notify(&mut self, notice: Notice);

    /// Redraw the map canvas
    fn refresh_map(&mut self);
}

/// An [`Interface`] that records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    pub notices: Vec<Notice>,
    pub refreshes: usize,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&Notice> {
        self.notices.last()
    }
}

impl Interface for NoticeLog {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn refresh_map(&mut self) {
        self.refreshes += 1;
    }
}
