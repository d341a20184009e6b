//! Report delivery for interactive runs: the report goes to stderr.

use std::io::Write;

use tracing::info;

use urssaf_core::{Attachment, CoreError, Notifier};

pub struct ConsoleNotifier {
    quiet: bool,
}

impl ConsoleNotifier {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Notifier for ConsoleNotifier {
    fn send(
        &self,
        recipient: Option<&str>,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> Result<(), CoreError> {
        info!(
            recipient = recipient.unwrap_or("-"),
            subject,
            attachments = attachments.len(),
            "declaration report"
        );
        if self.quiet {
            return Ok(());
        }

        let mut out = std::io::stderr().lock();
        let mut write = || -> std::io::Result<()> {
            writeln!(out, "── {subject} ──")?;
            writeln!(out, "{body}")?;
            for attachment in attachments {
                writeln!(out, "  attached: {} ({} bytes)", attachment.name, attachment.bytes.len())?;
            }
            Ok(())
        };
        write().map_err(|e| CoreError::Notify {
            message: e.to_string(),
        })
    }
}
