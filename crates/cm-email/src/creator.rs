//! Message Creator
//!
//! Composes multipart messages from email properties and hands them to a
//! mail transport.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{EmailError, EmailResult};
use crate::html::html_to_plain;
use crate::message::{EmailInfo, EmailProperties};
use crate::mime_message::MimeMessage;
use crate::sender::MailSender;

static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z0-9_.]+)\s*\}").unwrap()
});

/// Renders the HTML body of messages that arrive without one
pub trait MessageBodyBuilder: Send + Sync {
    fn build_message_body(&self, info: &EmailInfo, props: &EmailProperties) -> EmailResult<String>;
}

/// Body builder substituting `${name}` placeholders.
///
/// Uses the template on the `EmailInfo` when present, the builder's own
/// template otherwise. Dotted names walk into nested objects and string
/// values are HTML-escaped.
#[derive(Debug, Clone)]
pub struct PlaceholderBodyBuilder {
    template: String,
}

impl PlaceholderBodyBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    fn render(template: &str, props: &EmailProperties) -> EmailResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in PLACEHOLDER_PATTERN.captures_iter(template) {
            let (whole, name) = match (caps.get(0), caps.get(1)) {
                (Some(whole), Some(name)) => (whole, name.as_str()),
                _ => continue,
            };

            out.push_str(&template[last..whole.start()]);
            out.push_str(&Self::lookup(name, props)?);
            last = whole.end();
        }
        out.push_str(&template[last..]);

        Ok(out)
    }

    fn lookup(name: &str, props: &EmailProperties) -> EmailResult<String> {
        let mut segments = name.split('.');
        let mut value = segments
            .next()
            .and_then(|first| props.variables.get(first));
        for segment in segments {
            value = value.and_then(|v| v.get(segment));
        }

        match value {
            Some(Value::String(s)) => Ok(escape_html(s)),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(Value::Null) => Ok(String::new()),
            Some(_) => Err(EmailError::TemplateError(format!(
                "Placeholder '{}' is not a scalar value",
                name
            ))),
            None => Err(EmailError::TemplateError(format!(
                "Unknown placeholder '{}'",
                name
            ))),
        }
    }
}

impl MessageBodyBuilder for PlaceholderBodyBuilder {
    fn build_message_body(&self, info: &EmailInfo, props: &EmailProperties) -> EmailResult<String> {
        let template = info.template.as_deref().unwrap_or(&self.template);
        Self::render(template, props)
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Composes and dispatches messages
pub struct MessageCreator<B> {
    sender: Arc<dyn MailSender>,
    body_builder: B,
}

impl<B: MessageBodyBuilder> MessageCreator<B> {
    pub fn new(sender: Arc<dyn MailSender>, body_builder: B) -> Self {
        Self {
            sender,
            body_builder,
        }
    }

    pub fn sender(&self) -> &Arc<dyn MailSender> {
        &self.sender
    }

    /// Compose the multipart message described by `props`.
    ///
    /// The HTML body is rendered only when none was supplied; the plain text
    /// alternative is always derived from the HTML.
    pub fn build_message(&self, props: &EmailProperties) -> EmailResult<MimeMessage> {
        let target = &props.target;
        let info = &props.info;
        target.validate()?;

        let html = match &info.message_body {
            Some(body) => body.clone(),
            None => self.body_builder.build_message_body(info, props)?,
        };
        let text = html_to_plain(&html);

        let mut message = MimeMessage::new(
            &info.from_address,
            &target.email_address,
            &info.subject,
            &info.encoding,
        )
        .with_text(text, html)
        .with_cc(target.cc_addresses.clone())
        .with_bcc(target.bcc_addresses.clone());

        for attachment in &info.attachments {
            attachment.content_type()?;
            message = message.attach(attachment.clone());
        }
        message.validate()?;

        Ok(message)
    }

    /// Compose and deliver. Transport failures are returned as-is.
    #[instrument(skip(self, props), fields(to = %props.target.email_address, email_type = ?props.info.email_type))]
    pub async fn send_message(&self, props: &EmailProperties) -> EmailResult<String> {
        let message = self.build_message(props)?;

        let id = self.sender.send(&message).await.map_err(|e| {
            warn!(error = %e, "Email delivery failed");
            e
        })?;
        debug!(id = %id, "Email handed to transport");

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Attachment, EmailTarget};
    use crate::sender::{MemoryMailSender, MockMailSender};
    use bytes::Bytes;
    use serde_json::json;

    const TEMPLATE: &str =
        "<p>Hi ${name}</p><p>Order <a href=\"${order.url}\">${ order.number }</a></p>";

    fn props() -> EmailProperties {
        EmailProperties::new(
            EmailTarget::new("ada@example.com").bcc(vec!["audit@shop.test".to_string()]),
            EmailInfo::new("Your order", "orders@shop.test").with_type("ORDER_CONFIRMATION"),
        )
        .with_variable("name", "Ada")
        .with_variable(
            "order",
            json!({ "number": 1001, "url": "https://shop.test/orders/1001" }),
        )
    }

    #[test]
    fn test_placeholder_rendering() {
        let builder = PlaceholderBodyBuilder::new(TEMPLATE);
        let props = props();

        let body = builder.build_message_body(&props.info, &props).unwrap();
        assert_eq!(
            body,
            "<p>Hi Ada</p><p>Order <a href=\"https://shop.test/orders/1001\">1001</a></p>"
        );
    }

    #[test]
    fn test_placeholder_values_are_escaped() {
        let builder = PlaceholderBodyBuilder::new("<p>${name}</p>");
        let props = props().with_variable("name", "<b>Ada & co</b>");

        let body = builder.build_message_body(&props.info, &props).unwrap();
        assert_eq!(body, "<p>&lt;b&gt;Ada &amp; co&lt;/b&gt;</p>");
    }

    #[test]
    fn test_unknown_placeholder() {
        let builder = PlaceholderBodyBuilder::new("<p>${missing}</p>");
        let props = props();

        let result = builder.build_message_body(&props.info, &props);
        assert!(matches!(result, Err(EmailError::TemplateError(_))));
    }

    #[test]
    fn test_build_message_renders_both_parts() {
        let creator = MessageCreator::new(
            Arc::new(MemoryMailSender::new()),
            PlaceholderBodyBuilder::new(TEMPLATE),
        );

        let message = creator.build_message(&props()).unwrap();

        assert_eq!(message.to, "ada@example.com");
        assert_eq!(message.bcc, vec!["audit@shop.test"]);
        assert_eq!(message.charset, "UTF-8");
        assert!(message.html_body.starts_with("<p>Hi Ada</p>"));
        assert_eq!(
            message.text_body,
            "Hi Ada\nOrder 1001 <https://shop.test/orders/1001>\n"
        );
    }

    #[test]
    fn test_prerendered_body_skips_builder() {
        let creator = MessageCreator::new(
            Arc::new(MemoryMailSender::new()),
            PlaceholderBodyBuilder::new("${does.not.exist}"),
        );
        let mut props = props();
        props.info = props.info.with_body("<div>Shipped</div>");

        let message = creator.build_message(&props).unwrap();
        assert_eq!(message.text_body, "Shipped\n");
    }

    #[test]
    fn test_info_template_overrides_builder_template() {
        let creator = MessageCreator::new(
            Arc::new(MemoryMailSender::new()),
            PlaceholderBodyBuilder::new(TEMPLATE),
        );
        let mut props = props();
        props.info = props.info.with_template("<p>Bye ${name}</p>");

        let message = creator.build_message(&props).unwrap();
        assert_eq!(message.text_body, "Bye Ada\n");
    }

    #[tokio::test]
    async fn test_send_message_delivers() {
        let sender = Arc::new(MemoryMailSender::new());
        let creator = MessageCreator::new(sender.clone(), PlaceholderBodyBuilder::new(TEMPLATE));
        let mut props = props();
        props.info = props
            .info
            .attach(Attachment::new("invoice.pdf", Bytes::from_static(b"%PDF")));

        let id = creator.send_message(&props).await.unwrap();

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, id);
        assert_eq!(sent[0].attachments[0].mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_transport_failure_is_surfaced() {
        let mut sender = MockMailSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailError::SendFailed("connection refused".to_string())));
        let creator = MessageCreator::new(Arc::new(sender), PlaceholderBodyBuilder::new(TEMPLATE));

        let result = creator.send_message(&props()).await;
        assert!(matches!(result, Err(EmailError::SendFailed(msg)) if msg == "connection refused"));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_transport() {
        let mut sender = MockMailSender::new();
        sender.expect_send().never();
        let creator = MessageCreator::new(Arc::new(sender), PlaceholderBodyBuilder::new(TEMPLATE));

        let mut bad_recipient = props();
        bad_recipient.target = EmailTarget::new("nobody");
        assert!(matches!(
            creator.send_message(&bad_recipient).await,
            Err(EmailError::InvalidRecipient(_))
        ));

        let mut bad_attachment = props();
        bad_attachment.info = bad_attachment
            .info
            .attach(Attachment::new("data.bin", Bytes::from_static(b"x")).with_mime_type("bogus"));
        assert!(matches!(
            creator.send_message(&bad_attachment).await,
            Err(EmailError::InvalidAttachment(_))
        ));

        let mut latin1 = props();
        latin1.info = latin1.info.with_encoding("ISO-8859-1");
        assert!(matches!(
            creator.send_message(&latin1).await,
            Err(EmailError::UnsupportedEncoding(_))
        ));

        let mut injected = props();
        injected.info.subject = "Hi\r\nBcc: victim@evil.test".to_string();
        assert!(matches!(
            creator.send_message(&injected).await,
            Err(EmailError::InvalidHeader(_))
        ));
    }
}
