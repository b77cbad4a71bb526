//! Email descriptors
//!
//! Who a message goes to, what it says and what travels with it.

use std::sync::LazyLock;

use bytes::Bytes;
use cm_core::EmailConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EmailError, EmailResult};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s<>]+@[^@\s<>]+\.[^@\s<>]+$").unwrap()
});

fn check_address(address: &str) -> EmailResult<()> {
    if EMAIL_PATTERN.is_match(address.trim()) {
        Ok(())
    } else {
        Err(EmailError::InvalidRecipient(address.to_string()))
    }
}

/// Recipient of a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTarget {
    pub email_address: String,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
}

impl EmailTarget {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            ..Self::default()
        }
    }

    pub fn cc(mut self, addresses: Vec<String>) -> Self {
        self.cc_addresses = addresses;
        self
    }

    pub fn bcc(mut self, addresses: Vec<String>) -> Self {
        self.bcc_addresses = addresses;
        self
    }

    /// Check the primary, CC and BCC addresses
    pub fn validate(&self) -> EmailResult<()> {
        check_address(&self.email_address)?;
        for address in self.cc_addresses.iter().chain(&self.bcc_addresses) {
            check_address(address)?;
        }
        Ok(())
    }
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Bytes,
    pub mime_type: String,
}

impl Attachment {
    /// Create an attachment, guessing the MIME type from the file name
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();
        Self {
            filename,
            data: data.into(),
            mime_type,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Parsed MIME type, rejecting malformed values
    pub fn content_type(&self) -> EmailResult<mime::Mime> {
        self.mime_type.parse().map_err(|_| {
            EmailError::InvalidAttachment(format!(
                "{} has invalid MIME type '{}'",
                self.filename, self.mime_type
            ))
        })
    }
}

/// Message content and sender
#[derive(Debug, Clone)]
pub struct EmailInfo {
    /// Kind of message (order confirmation, password reset, ...)
    pub email_type: Option<String>,
    pub subject: String,
    pub from_address: String,
    pub encoding: String,
    /// Pre-rendered HTML body; rendered from the template when absent
    pub message_body: Option<String>,
    /// Template used by body builders that support one
    pub template: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl EmailInfo {
    pub fn new(subject: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            email_type: None,
            subject: subject.into(),
            from_address: from_address.into(),
            encoding: "UTF-8".to_string(),
            message_body: None,
            template: None,
            attachments: Vec::new(),
        }
    }

    /// Sender and encoding taken from configuration
    pub fn from_config(config: &EmailConfig, subject: impl Into<String>) -> Self {
        let from = match &config.from_name {
            Some(name) => format!("{} <{}>", name, config.from_address),
            None => config.from_address.clone(),
        };
        Self::new(subject, from).with_encoding(config.encoding.clone())
    }

    pub fn with_type(mut self, email_type: impl Into<String>) -> Self {
        self.email_type = Some(email_type.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_body(mut self, html: impl Into<String>) -> Self {
        self.message_body = Some(html.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Everything needed to compose one message
#[derive(Debug, Clone)]
pub struct EmailProperties {
    pub target: EmailTarget,
    pub info: EmailInfo,
    /// Values available to body templates
    pub variables: Map<String, Value>,
}

impl EmailProperties {
    pub fn new(target: EmailTarget, info: EmailInfo) -> Self {
        Self {
            target,
            info,
            variables: Map::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_validation() {
        let target = EmailTarget::new("customer@example.com")
            .cc(vec!["sales@example.com".to_string()])
            .bcc(vec!["audit@example.com".to_string()]);
        assert!(target.validate().is_ok());

        let bad_cc = EmailTarget::new("customer@example.com").cc(vec!["not-an-address".to_string()]);
        assert!(matches!(
            bad_cc.validate(),
            Err(EmailError::InvalidRecipient(addr)) if addr == "not-an-address"
        ));

        assert!(EmailTarget::new("").validate().is_err());
    }

    #[test]
    fn test_attachment_mime_guess() {
        let pdf = Attachment::new("invoice.pdf", Bytes::from_static(b"%PDF"));
        assert_eq!(pdf.mime_type, "application/pdf");
        assert_eq!(pdf.content_type().unwrap(), mime::APPLICATION_PDF);

        let unknown = Attachment::new("blob", Bytes::from_static(b"?"));
        assert_eq!(unknown.mime_type, "application/octet-stream");

        let broken = unknown.with_mime_type("not a mime");
        assert!(matches!(
            broken.content_type(),
            Err(EmailError::InvalidAttachment(_))
        ));
    }

    #[test]
    fn test_info_from_config() {
        let config = EmailConfig {
            from_name: Some("Heat Clinic".to_string()),
            from_address: "orders@heatclinic.test".to_string(),
            encoding: "ISO-8859-1".to_string(),
            ..EmailConfig::default()
        };

        let info = EmailInfo::from_config(&config, "Order shipped");
        assert_eq!(info.from_address, "Heat Clinic <orders@heatclinic.test>");
        assert_eq!(info.encoding, "ISO-8859-1");
        assert!(info.message_body.is_none());
    }
}
