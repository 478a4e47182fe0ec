#![warn(missing_docs)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]
// Fail on warnings in doc tests
#![doc(test(attr(deny(warnings))))]

//! Jsax is an [RFC 8259](https://www.rfc-editor.org/rfc/rfc8259.html) compliant
//! streaming JSON codec: an incremental, push-driven parser which emits
//! SAX-style semantic events as bytes arrive, and a streaming writer with
//! optional pretty-printing.
//!
//! Its defining property is constant memory use. The parser holds no
//! document-sized buffer; it tokenizes directly out of caller-owned storage
//! and delivers each event the moment the corresponding token is complete,
//! no matter how the input is fragmented: chunk boundaries may fall inside
//! multi-byte UTF-8 sequences, escape sequences, surrogate pairs or number
//! exponents. This makes it suitable for parsing documents of unbounded
//! size, and for parsing network streams incrementally as data arrives.
//!
//! Jsax is *not* an object mapper and builds no document tree; a handler
//! receives the events and decides what to keep. For converting structs to
//! JSON and vice versa a dedicated library such as
//! [Serde](https://github.com/serde-rs/json) should be used instead.
//!
//! # Parsing
//!
//! Implement [`JsonContentHandler`](parser::JsonContentHandler) for the
//! events of interest and push chunks into a
//! [`JsonStreamParser`](parser::JsonStreamParser):
//!
//! ```
//! use bytes::BytesMut;
//! use jsax::parser::{JsonContentHandler, JsonError, JsonStreamParser};
//!
//! #[derive(Default)]
//! struct Names {
//!     names: Vec<String>,
//! }
//!
//! impl JsonContentHandler for Names {
//!     fn string_value(&mut self, value: &str) -> Result<(), JsonError> {
//!         self.names.push(value.to_owned());
//!         Ok(())
//!     }
//! }
//!
//! let mut parser = JsonStreamParser::new();
//! let mut handler = Names::default();
//!
//! // In this example the JSON data is pushed in two chunks;
//! // normally the chunks would come from a network connection
//! let mut buffer = BytesMut::from(&b"[\"Ali"[..]);
//! parser.receive(&mut buffer, &mut handler)?;
//! buffer.extend_from_slice(b"ce\", \"Bob\"]");
//! parser.receive(&mut buffer, &mut handler)?;
//! parser.close(&mut handler)?;
//!
//! assert_eq!(handler.names, ["Alice", "Bob"]);
//! # Ok::<(), jsax::parser::JsonError>(())
//! ```
//!
//! # Writing
//!
//! ```
//! use jsax::writer::{JsonStreamWriter, JsonWriter};
//!
//! let mut writer = Vec::<u8>::new();
//! let mut json_writer = JsonStreamWriter::new(&mut writer);
//!
//! json_writer.begin_object()?;
//! json_writer.key("name")?;
//! json_writer.string_value("Alice")?;
//! json_writer.key("age")?;
//! json_writer.number_value(30)?;
//! json_writer.end_object()?;
//! json_writer.finish()?;
//!
//! let json = String::from_utf8(writer)?;
//! assert_eq!(json, r#"{"name":"Alice","age":30}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod parser;
pub mod writer;

mod number;
mod utf8;

pub use number::JsonNumber;
