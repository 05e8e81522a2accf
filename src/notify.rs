// ABOUTME: Failure notifications to the authors of a change.
// ABOUTME: Mail is handed to a sendmail-compatible command; without one, notices are only logged.

use async_trait::async_trait;
use nonempty::NonEmpty;
use std::fmt;

use crate::exec::{CommandRunner, ExecError};
use crate::github::Author;

/// Name shown in the `From:` header.
pub const SENDER_NAME: &str = "quickcd";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub name: String,
    pub email: String,
}

impl Address {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl From<&Author> for Address {
    fn from(author: &Author) -> Self {
        Self::new(&author.name, &author.email)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.replace(['"', '\r', '\n'], "");
        if name.is_empty() {
            write!(f, "<{}>", self.email)
        } else {
            write!(f, "\"{name}\" <{}>", self.email)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to send mail: {0}")]
    Send(#[from] ExecError),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        subject: &str,
        recipients: &NonEmpty<Address>,
        body: &str,
    ) -> Result<(), NotifyError>;
}

/// Render a plain-text message with de-duplicated recipients.
pub fn render_message(from: &str, subject: &str, recipients: &NonEmpty<Address>, body: &str) -> String {
    let mut to: Vec<&Address> = Vec::new();
    for addr in recipients.iter() {
        if !to.iter().any(|seen| seen.email.eq_ignore_ascii_case(&addr.email)) {
            to.push(addr);
        }
    }
    let to = to.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
    let subject = subject.replace(['\r', '\n'], " ");

    format!(
        "From: {SENDER_NAME} <{from}>\r\nTo: {to}\r\nSubject: {subject}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
    )
}

#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    runner: CommandRunner,
    command: String,
    from: String,
}

impl SendmailNotifier {
    pub fn new(runner: CommandRunner, command: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            runner,
            command: command.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Notifier for SendmailNotifier {
    async fn notify(
        &self,
        subject: &str,
        recipients: &NonEmpty<Address>,
        body: &str,
    ) -> Result<(), NotifyError> {
        let message = render_message(&self.from, subject, recipients, body);
        self.runner
            .sh_with_input(&self.command, Some(message.as_bytes()))
            .await?;
        tracing::info!(subject, recipients = recipients.len(), "sent notification");
        Ok(())
    }
}

/// Used when no mail transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        subject: &str,
        recipients: &NonEmpty<Address>,
        _body: &str,
    ) -> Result<(), NotifyError> {
        let to = recipients.iter().map(|a| a.email.as_str()).collect::<Vec<_>>().join(", ");
        tracing::warn!(subject, to = %to, "email not configured, notification not sent");
        Ok(())
    }
}
