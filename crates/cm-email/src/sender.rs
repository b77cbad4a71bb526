//! Mail transports

use std::sync::Arc;

use async_trait::async_trait;
use cm_core::{EmailConfig, EmailDeliveryMethod};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::EmailResult;
use crate::mime_message::MimeMessage;

/// Mail sender trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a composed message, returning its message ID
    async fn send(&self, message: &MimeMessage) -> EmailResult<String>;

    /// Check if the sender is configured
    fn is_configured(&self) -> bool;
}

/// Sender writing messages to the log (for development).
///
/// The rendered message is logged at debug level.
#[derive(Debug, Default)]
pub struct LogMailSender;

impl LogMailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, message: &MimeMessage) -> EmailResult<String> {
        let raw = message.to_rfc5322()?;
        info!(
            id = %message.id,
            from = %message.from,
            to = ?message.recipients(),
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Email sent"
        );
        debug!(size = raw.len(), "Rendered email\n{}", raw);

        Ok(message.id.clone())
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Sender keeping every message, and its rendered form, in memory
#[derive(Debug, Default)]
pub struct MemoryMailSender {
    sent: RwLock<Vec<(MimeMessage, String)>>,
}

impl MemoryMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<MimeMessage> {
        self.sent.read().await.iter().map(|(m, _)| m.clone()).collect()
    }

    /// RFC 5322 text of every message, in send order
    pub async fn raw(&self) -> Vec<String> {
        self.sent.read().await.iter().map(|(_, raw)| raw.clone()).collect()
    }
}

#[async_trait]
impl MailSender for MemoryMailSender {
    async fn send(&self, message: &MimeMessage) -> EmailResult<String> {
        let raw = message.to_rfc5322()?;
        self.sent.write().await.push((message.clone(), raw));
        Ok(message.id.clone())
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Sender for the configured delivery method
pub fn sender_for(config: &EmailConfig) -> Arc<dyn MailSender> {
    match config.delivery_method {
        EmailDeliveryMethod::Log => Arc::new(LogMailSender::new()),
        EmailDeliveryMethod::Memory => Arc::new(MemoryMailSender::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmailError;

    fn message() -> MimeMessage {
        MimeMessage::new("store@shop.test", "user@example.com", "Test", "UTF-8")
            .with_text("Test body", "<p>Test body</p>")
    }

    #[tokio::test]
    async fn test_log_sender() {
        let sender = LogMailSender::new();
        let message = message();

        let id = sender.send(&message).await.unwrap();
        assert_eq!(id, message.id);
        assert!(sender.is_configured());
    }

    #[tokio::test]
    async fn test_memory_sender_keeps_messages() {
        let sender = MemoryMailSender::new();
        sender.send(&message()).await.unwrap();
        sender.send(&message()).await.unwrap();

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Test");
    }

    #[tokio::test]
    async fn test_memory_sender_keeps_rendered_form() {
        let sender = MemoryMailSender::new();
        let message = message();
        sender.send(&message).await.unwrap();

        let raw = sender.raw().await;
        assert_eq!(raw.len(), 1);
        assert!(raw[0].starts_with(&format!("Message-ID: <{}@commerce-rs>\r\n", message.id)));
        assert!(raw[0].contains("Subject: Test\r\n"));
    }

    #[tokio::test]
    async fn test_senders_refuse_unrenderable_messages() {
        let message = MimeMessage::new("store@shop.test", "user@example.com", "Test", "ISO-8859-1");

        assert!(matches!(
            LogMailSender::new().send(&message).await,
            Err(EmailError::UnsupportedEncoding(_))
        ));

        let memory = MemoryMailSender::new();
        assert!(memory.send(&message).await.is_err());
        assert!(memory.sent().await.is_empty());
    }

    #[test]
    fn test_sender_for_config() {
        let sender = sender_for(&EmailConfig::default());
        assert!(sender.is_configured());
    }
}
