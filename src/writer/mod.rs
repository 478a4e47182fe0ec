//! Module for writing JSON data
//!
//! [`JsonWriter`] is the general trait for JSON writers, [`JsonStreamWriter`] is an
//! implementation of it which writes a JSON document to a [`Write`](std::io::Write)
//! in a streaming way.

use crate::number::JsonNumber;

mod stream_writer;
// Re-export streaming implementation under `writer` module
pub use stream_writer::*;

type IoError = std::io::Error;

/// A trait for JSON writers
///
/// The writer emits one token per method call: brackets with the `begin_` /
/// `end_` methods, member names with [`key`](Self::key) and values with the
/// value writing methods such as [`string_value`](Self::string_value). Strings
/// are quoted and escaped automatically.
///
/// The writer inserts the separators (`,`, `:` and, when indentation is
/// configured, optional whitespace) which the emitted token sequence
/// requires, but it does **not** validate the event ordering: the caller is
/// responsible for balanced `begin_`/`end_` pairs and for writing a key
/// before every object member value.
///
/// Once the document is complete, [`finish`](Self::finish) flushes buffered
/// bytes and releases the underlying sink.
///
/// # Examples
/// ```
/// # use jsax::writer::*;
/// // In this example JSON bytes are stored in a Vec;
/// // normally they would be written to a file or network connection
/// let mut writer = Vec::<u8>::new();
/// let mut json_writer = JsonStreamWriter::new(&mut writer);
///
/// json_writer.begin_object()?;
/// json_writer.key("a")?;
///
/// json_writer.begin_array()?;
/// json_writer.number_value(1)?;
/// json_writer.bool_value(true)?;
/// json_writer.end_array()?;
///
/// json_writer.end_object()?;
/// json_writer.finish()?;
///
/// let json = String::from_utf8(writer)?;
/// assert_eq!(json, r#"{"a":[1,true]}"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait JsonWriter {
    /// Result returned by [`finish`](Self::finish)
    type Output;

    /// Writes the opening bracket `{` of a JSON object
    ///
    /// Must be matched by a corresponding [`end_object`](Self::end_object) call.
    fn begin_object(&mut self) -> Result<(), IoError>;

    /// Writes the closing bracket `}` of the current JSON object
    fn end_object(&mut self) -> Result<(), IoError>;

    /// Writes the opening bracket `[` of a JSON array
    ///
    /// Must be matched by a corresponding [`end_array`](Self::end_array) call.
    fn begin_array(&mut self) -> Result<(), IoError>;

    /// Writes the closing bracket `]` of the current JSON array
    fn end_array(&mut self) -> Result<(), IoError>;

    /// Writes an object key (member name)
    ///
    /// The key is quoted and escaped like a string value and followed by a
    /// colon; the next written value becomes the member value.
    fn key(&mut self, key: &str) -> Result<(), IoError>;

    /// Writes a JSON string value, quoted and escaped
    fn string_value(&mut self, value: &str) -> Result<(), IoError>;

    /// Writes a JSON number value
    ///
    /// Accepts anything convertible into a [`JsonNumber`], including plain
    /// `i32`, `i64` and `f64` values.
    ///
    /// # Errors
    /// Returns an error of kind [`InvalidData`](std::io::ErrorKind::InvalidData)
    /// for non-finite floating-point values, which have no JSON
    /// representation.
    fn number_value<N: Into<JsonNumber>>(&mut self, value: N) -> Result<(), IoError>;

    /// Writes a JSON boolean value
    fn bool_value(&mut self, value: bool) -> Result<(), IoError>;

    /// Writes a JSON null value
    fn null_value(&mut self) -> Result<(), IoError>;

    /// Writes buffered bytes to the underlying sink
    fn flush(&mut self) -> Result<(), IoError>;

    /// Flushes and releases the underlying sink
    ///
    /// The writer performs no completeness check; the caller is responsible
    /// for having written balanced brackets.
    fn finish(self) -> Result<Self::Output, IoError>
    where
        Self: Sized;
}
