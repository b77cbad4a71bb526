//! Composed multipart message

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};

use crate::error::{EmailError, EmailResult};
use crate::message::Attachment;

const CRLF: &str = "\r\n";
const LINE_LENGTH: usize = 76;
/// Text parts and encoded words are always written as UTF-8
const CHARSET: &str = "UTF-8";

/// A fully composed message ready for a transport
#[derive(Debug, Clone)]
pub struct MimeMessage {
    /// Message ID
    pub id: String,
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    /// Envelope-only recipients, never written to the headers
    pub bcc: Vec<String>,
    pub subject: String,
    pub charset: String,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl MimeMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        charset: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            from: from.into(),
            to: to.into(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            charset: charset.into(),
            text_body: String::new(),
            html_body: String::new(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the plain text and HTML alternatives
    pub fn with_text(mut self, text: impl Into<String>, html: impl Into<String>) -> Self {
        self.text_body = text.into();
        self.html_body = html.into();
        self
    }

    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    pub fn with_bcc(mut self, bcc: Vec<String>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Every envelope recipient: to, cc and bcc
    pub fn recipients(&self) -> Vec<&str> {
        std::iter::once(self.to.as_str())
            .chain(self.cc.iter().map(String::as_str))
            .chain(self.bcc.iter().map(String::as_str))
            .collect()
    }

    /// Check that the message renders faithfully.
    ///
    /// Only UTF-8 is accepted as charset. Header values and attachment names
    /// must not contain line breaks.
    pub fn validate(&self) -> EmailResult<()> {
        if !is_utf8_label(&self.charset) {
            return Err(EmailError::UnsupportedEncoding(format!(
                "{} (messages are encoded as {})",
                self.charset, CHARSET
            )));
        }

        check_header_value("From", &self.from)?;
        check_header_value("To", &self.to)?;
        for address in self.cc.iter().chain(&self.bcc) {
            check_header_value("Cc", address)?;
        }
        check_header_value("Subject", &self.subject)?;
        for attachment in &self.attachments {
            check_header_value("attachment filename", &attachment.filename)?;
            check_header_value("attachment type", &attachment.mime_type)?;
        }

        Ok(())
    }

    /// Render as an RFC 5322 message.
    ///
    /// Layout: `multipart/mixed` holding a `multipart/alternative` (text, then
    /// HTML) followed by one base64 part per attachment.
    pub fn to_rfc5322(&self) -> EmailResult<String> {
        self.validate()?;

        let mixed = format!("mixed-{}", self.id);
        let alternative = format!("alt-{}", self.id);
        let mut out = String::new();

        header(&mut out, "Message-ID", &format!("<{}@commerce-rs>", self.id));
        header(&mut out, "Date", &self.created_at.to_rfc2822());
        header(&mut out, "From", &self.from);
        header(&mut out, "To", &self.to);
        if !self.cc.is_empty() {
            header(&mut out, "Cc", &self.cc.join(", "));
        }
        header(&mut out, "Subject", &encode_word(&self.subject));
        header(&mut out, "MIME-Version", "1.0");
        header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{}\"", mixed),
        );
        out.push_str(CRLF);

        boundary(&mut out, &mixed);
        header(
            &mut out,
            "Content-Type",
            &format!("multipart/alternative; boundary=\"{}\"", alternative),
        );
        out.push_str(CRLF);

        for (subtype, body) in [("plain", &self.text_body), ("html", &self.html_body)] {
            boundary(&mut out, &alternative);
            header(
                &mut out,
                "Content-Type",
                &format!("text/{}; charset={}", subtype, CHARSET),
            );
            header(&mut out, "Content-Transfer-Encoding", "base64");
            out.push_str(CRLF);
            base64_body(&mut out, body.as_bytes());
        }
        closing_boundary(&mut out, &alternative);

        for attachment in &self.attachments {
            boundary(&mut out, &mixed);
            let filename = quoted_parameter(&attachment.filename);
            header(
                &mut out,
                "Content-Type",
                &format!("{}; name={}", attachment.mime_type, filename),
            );
            header(
                &mut out,
                "Content-Disposition",
                &format!("attachment; filename={}", filename),
            );
            header(&mut out, "Content-Transfer-Encoding", "base64");
            out.push_str(CRLF);
            base64_body(&mut out, &attachment.data);
        }
        closing_boundary(&mut out, &mixed);

        Ok(out)
    }
}

fn header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str(CRLF);
}

fn boundary(out: &mut String, boundary: &str) {
    out.push_str("--");
    out.push_str(boundary);
    out.push_str(CRLF);
}

fn closing_boundary(out: &mut String, boundary: &str) {
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("--");
    out.push_str(CRLF);
}

fn base64_body(out: &mut String, data: &[u8]) {
    let encoded = STANDARD.encode(data);
    for line in encoded.as_bytes().chunks(LINE_LENGTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push_str(CRLF);
    }
}

fn is_utf8_label(charset: &str) -> bool {
    charset.trim().eq_ignore_ascii_case("utf-8") || charset.trim().eq_ignore_ascii_case("utf8")
}

fn check_header_value(field: &str, value: &str) -> EmailResult<()> {
    if value.contains(['\r', '\n']) {
        return Err(EmailError::InvalidHeader(format!(
            "{} contains a line break: {:?}",
            field, value
        )));
    }
    Ok(())
}

/// RFC 2047 encoded-word for non-ASCII header values
fn encode_word(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?{}?B?{}?=", CHARSET, STANDARD.encode(value.as_bytes()))
    }
}

/// Quoted-string parameter value, escaping quotes and backslashes
fn quoted_parameter(value: &str) -> String {
    let value = encode_word(value);
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
