//! # cm-email
//!
//! Email composition for Commerce RS.
//!
//! ## Features
//!
//! - HTML to plain text rendering for the text alternative of a message
//! - Multipart message composition (text, HTML, attachments)
//! - Pluggable body rendering and mail transports
//!
//! ## Example
//!
//! ```rust,ignore
//! use cm_email::{EmailInfo, EmailProperties, EmailTarget, MessageCreator, PlaceholderBodyBuilder};
//!
//! let creator = MessageCreator::new(sender, PlaceholderBodyBuilder::new("<p>Hi ${name}</p>"));
//! let props = EmailProperties::new(
//!     EmailTarget::new("customer@example.com"),
//!     EmailInfo::new("Your order", "orders@example.com"),
//! )
//! .with_variable("name", "Ada");
//! let message_id = creator.send_message(&props).await?;
//! ```

pub mod creator;
pub mod error;
pub mod html;
pub mod message;
pub mod mime_message;
pub mod sender;

pub use creator::{MessageBodyBuilder, MessageCreator, PlaceholderBodyBuilder};
pub use error::{EmailError, EmailResult};
pub use html::html_to_plain;
pub use message::{Attachment, EmailInfo, EmailProperties, EmailTarget};
pub use mime_message::MimeMessage;
pub use sender::{sender_for, LogMailSender, MailSender, MemoryMailSender};
