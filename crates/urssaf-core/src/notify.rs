// ── Notification ──
//
// The workflow reports each completed declaration through a `Notifier`.
// Delivery (mail, console, files) is the caller's business.

use crate::error::CoreError;

/// A file sent along with a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Deliver a report. `recipient` is the configured address, if any.
    fn send(
        &self,
        recipient: Option<&str>,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> Result<(), CoreError>;
}
