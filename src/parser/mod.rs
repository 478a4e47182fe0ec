//! Module for parsing JSON data
//!
//! [`JsonStreamParser`] is a push-driven JSON parser: the caller feeds it
//! chunks of bytes as they arrive and receives semantic events through a
//! [`JsonContentHandler`] implementation the moment a complete token is
//! recognized. The parser holds no document-sized buffer, making it suitable
//! for parsing documents of unbounded size in constant memory.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::number::JsonNumber;

mod stream_parser;
// Re-export streaming implementation under `parser` module
pub use stream_parser::*;

/// Line and column position, both starting at 1
///
/// The characters _CR_ (U+000D), _LF_ (U+000A) and the pair _CR LF_ each
/// count as a single line break. All other characters advance the column by
/// one, regardless of how many bytes their UTF-8 encoding occupies.
///
/// # Examples
/// Consider the following JSON document:
/// ```json
/// {
///   "a": null
/// }
/// ```
/// The position of `null` is line 2, column 8.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct LinePosition {
    /// Line number, starting at 1
    pub line: u64,
    /// Character column within the current line, starting at 1
    pub column: u64,
}

impl Display for LinePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The error type for all JSON parsing failures
///
/// A single error kind covers malformed documents, encoding problems and
/// parser lifecycle misuse. The error carries a human-readable message, the
/// line/column position where the problem was detected (when one is
/// available) and optionally an underlying cause.
///
/// Once a [`JsonStreamParser`] has returned an error it is in a failed state
/// and every further [`receive`](JsonStreamParser::receive) or
/// [`close`](JsonStreamParser::close) call fails as well.
#[derive(Error, Debug)]
pub struct JsonError {
    message: String,
    location: Option<LinePosition>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Display for JsonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

impl JsonError {
    /// Creates an error with the given message
    ///
    /// This constructor is mainly intended for [`JsonContentHandler`]
    /// implementations which need to abort parsing; errors created by the
    /// parser itself additionally carry the document position.
    pub fn new(message: impl Into<String>) -> JsonError {
        JsonError {
            message: message.into(),
            location: None,
            cause: None,
        }
    }

    /// Creates an error with the given message and underlying cause
    pub fn with_cause(
        message: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> JsonError {
        JsonError {
            message: message.into(),
            location: None,
            cause: Some(cause.into()),
        }
    }

    pub(crate) fn at(message: impl Into<String>, location: LinePosition) -> JsonError {
        JsonError {
            message: message.into(),
            location: Some(location),
            cause: None,
        }
    }

    /// The error message, without the position suffix
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Position in the JSON document where the error was detected, if known
    pub fn location(&self) -> Option<LinePosition> {
        self.location
    }
}

/// Handler for JSON parse events
///
/// The parser calls these methods in document order as tokens are recognized,
/// before the triggering [`receive`](JsonStreamParser::receive) call returns.
/// All methods have no-op default implementations, so a handler only needs to
/// implement the events it cares about.
///
/// String and key payloads are borrowed views which are only valid for the
/// duration of the call; a handler which wants to retain them must copy.
///
/// Every method can return an error to abort parsing; the error propagates
/// out of [`receive`](JsonStreamParser::receive) unchanged and leaves the
/// parser in its failed state.
///
/// # Examples
/// ```
/// use jsax::parser::{JsonContentHandler, JsonError, JsonStreamParser};
///
/// #[derive(Default)]
/// struct KeyCollector {
///     keys: Vec<String>,
/// }
///
/// impl JsonContentHandler for KeyCollector {
///     fn key(&mut self, key: &str) -> Result<(), JsonError> {
///         self.keys.push(key.to_owned());
///         Ok(())
///     }
/// }
///
/// let mut parser = JsonStreamParser::new();
/// let mut handler = KeyCollector::default();
/// parser.parse(r#"{"a": 1, "b": 2}"#.as_bytes(), &mut handler)?;
/// assert_eq!(handler.keys, ["a", "b"]);
/// # Ok::<(), JsonError>(())
/// ```
pub trait JsonContentHandler {
    /// Indicates the start of a JSON object
    fn start_object(&mut self) -> Result<(), JsonError> {
        Ok(())
    }

    /// Indicates the end of a JSON object
    fn end_object(&mut self) -> Result<(), JsonError> {
        Ok(())
    }

    /// Indicates the start of a JSON array
    fn start_array(&mut self) -> Result<(), JsonError> {
        Ok(())
    }

    /// Indicates the end of a JSON array
    fn end_array(&mut self) -> Result<(), JsonError> {
        Ok(())
    }

    /// Notifies of a key in a JSON object
    ///
    /// A key is a string followed by a colon inside an object. It is always
    /// associated with the most recent preceding [`start_object`](Self::start_object)
    /// event.
    fn key(&mut self, _key: &str) -> Result<(), JsonError> {
        Ok(())
    }

    /// Notifies of a JSON string value, unescaped and unquoted
    fn string_value(&mut self, _value: &str) -> Result<(), JsonError> {
        Ok(())
    }

    /// Notifies of a JSON number value
    fn number_value(&mut self, _value: JsonNumber) -> Result<(), JsonError> {
        Ok(())
    }

    /// Notifies of a JSON boolean value
    fn boolean_value(&mut self, _value: bool) -> Result<(), JsonError> {
        Ok(())
    }

    /// Notifies of a JSON null value
    fn null_value(&mut self) -> Result<(), JsonError> {
        Ok(())
    }

    /// Notifies of whitespace between tokens
    ///
    /// Only called when [`needs_whitespace`](Self::needs_whitespace) returns
    /// true. The string contains the exact source characters of a maximal
    /// whitespace run.
    fn whitespace(&mut self, _whitespace: &str) -> Result<(), JsonError> {
        Ok(())
    }

    /// Whether this handler wants [`whitespace`](Self::whitespace) events
    ///
    /// False by default, which allows the parser to discard whitespace
    /// without materializing it. Handlers which preserve exact formatting
    /// (for example pretty-printers) should override this to return true.
    fn needs_whitespace(&self) -> bool {
        false
    }
}
