//! # postern-mime
//!
//! MIME message model and codecs for the postern mail client.
//!
//! ## Features
//!
//! - **Decoding**: Turn stored messages into a flat list of leaf parts with
//!   transfer encodings removed and text converted to UTF-8
//! - **Encoding**: Serialize messages into 7-bit clean wire format
//! - **Transfer codecs**: Base64, Quoted-Printable, RFC 2047 header words
//! - **Charsets**: Statistical detection of legacy encodings
//! - **Addresses**: RFC 5322 mailbox and address list parsing
//!
//! ## Quick Start
//!
//! ### Decoding a message
//!
//! ```
//! use postern_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject(), Some("Test"));
//! assert_eq!(message.parts[0].text_body(), Some("Hello, World!"));
//! # Ok::<(), postern_mime::Error>(())
//! ```
//!
//! ### Encoding a message
//!
//! ```
//! use postern_mime::{Message, Part};
//!
//! let mut message = Message::new();
//! message.headers.set("From", "sender@example.com");
//! message.headers.set("Subject", "Grüße");
//! message.parts.push(Part::text("Hello"));
//!
//! let wire = message.encode()?;
//! assert!(wire.is_ascii());
//! # Ok::<(), postern_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;

pub mod decode;
pub mod encode;
pub mod encoding;

pub use address::{Mailbox, format_address_list, parse_address_list};
pub use content_type::ContentType;
pub use decode::{MultipartSplitter, PartSource, read_message};
pub use encode::encode;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Message, Part, TEXT_PLAIN_UTF8, TransferEncoding};
