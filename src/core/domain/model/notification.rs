//! A rendered message ready for delivery.

use serde::Serialize;

/// Text of one outgoing message.
///
/// `content` is sent outside any embed so chat mentions in it notify the
/// recipient; `title` and `description` form the embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub content: Option<String>,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            content: None,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Single-line plain-text form, used by the log notifier.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(content) = &self.content {
            parts.push(content.as_str());
        }
        parts.push(self.title.as_str());
        if !self.description.is_empty() {
            parts.push(self.description.as_str());
        }
        parts.join(" | ").replace('\n', " | ")
    }
}
