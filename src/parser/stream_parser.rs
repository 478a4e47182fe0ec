//! Streaming push-model implementation of the JSON parser

use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};

use super::{JsonContentHandler, JsonError, LinePosition};
use crate::number::JsonNumber;
use crate::utf8;

/// Maximum capacity the escape-assembly scratch buffer keeps across string
/// tokens, so a single oversized string does not pin memory forever
const SCRATCH_RETAIN_LIMIT: usize = 16 * 1024;
/// Maximum capacity the partial-token carry buffer keeps once drained
const PENDING_RETAIN_LIMIT: usize = 16 * 1024;
/// Chunk size used by the blocking [`parse`](JsonStreamParser::parse) convenience
const PARSE_CHUNK_SIZE: usize = 8 * 1024;

const INITIAL_NESTING_CAPACITY: usize = 16;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum Container {
    Object,
    Array,
}

/// What the next non-whitespace token is permitted to be
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum Expect {
    Value,
    Key,
    Colon,
    AfterValue,
}

/// Result of scanning a complete string token
struct ScannedString {
    /// Total token length in bytes, including both quotes
    consumed: usize,
    /// Byte index of the closing quote
    close_quote: usize,
    /// Whether the decoded value was assembled in the scratch buffer because
    /// the string contains escape sequences
    uses_scratch: bool,
}

/// An incremental, push-driven JSON parser
///
/// Bytes are pushed into the parser with [`receive`](Self::receive) as they
/// arrive; semantic events are delivered synchronously to a
/// [`JsonContentHandler`] the moment a complete token is recognized. The
/// parser is strict per RFC 8259: no comments, no trailing commas, no
/// unquoted keys, UTF-8 input only (an optional UTF-8 byte order mark is
/// skipped; UTF-16 and UTF-32 byte order marks are rejected).
///
/// Memory use is constant with respect to the document size: the parser
/// tokenizes directly out of the caller's buffer and only retains an
/// incomplete trailing token between calls, so its allocations are bounded
/// by the longest single token and the nesting depth.
///
/// # Receiving data
/// [`receive`](Self::receive) consumes the complete buffer on every call; an
/// incomplete trailing token is carried over internally and resumes when more
/// bytes arrive, so chunk boundaries may fall anywhere, including inside multi-byte
/// UTF-8 sequences, escape sequences or number literals. [`close`](Self::close)
/// signals the end of input and validates that the document is complete.
///
/// # Examples
/// ```
/// use bytes::BytesMut;
/// use jsax::JsonNumber;
/// use jsax::parser::{JsonContentHandler, JsonError, JsonStreamParser};
///
/// #[derive(Default)]
/// struct Collector {
///     members: Vec<(String, JsonNumber)>,
///     current_key: String,
/// }
///
/// impl JsonContentHandler for Collector {
///     fn key(&mut self, key: &str) -> Result<(), JsonError> {
///         self.current_key = key.to_owned();
///         Ok(())
///     }
///
///     fn number_value(&mut self, value: JsonNumber) -> Result<(), JsonError> {
///         self.members.push((self.current_key.clone(), value));
///         Ok(())
///     }
/// }
///
/// let mut parser = JsonStreamParser::new();
/// let mut handler = Collector::default();
///
/// // Normally the chunks would come from a file or a network connection
/// let mut buffer = BytesMut::from(&br#"{"a": 1, "b"#[..]);
/// parser.receive(&mut buffer, &mut handler)?;
/// buffer.extend_from_slice(br#"": 2}"#);
/// parser.receive(&mut buffer, &mut handler)?;
/// parser.close(&mut handler)?;
///
/// assert_eq!(
///     handler.members,
///     vec![
///         ("a".to_owned(), JsonNumber::I32(1)),
///         ("b".to_owned(), JsonNumber::I32(2)),
///     ]
/// );
/// # Ok::<(), jsax::parser::JsonError>(())
/// ```
#[derive(Debug)]
pub struct JsonStreamParser {
    /// Whether the byte order mark check on the start of the stream has
    /// completed
    bom_checked: bool,
    closed: bool,
    /// Set once any error was returned; the parser is then terminal
    failed: bool,
    /// Whether any non-whitespace token was consumed
    seen_value: bool,
    stack: Vec<Container>,
    expect: Expect,
    /// True for exactly the interval between a comma and the next
    /// non-whitespace token, used to reject trailing commas
    after_comma: bool,
    /// Carries an incomplete trailing token between `receive` calls
    pending: BytesMut,
    /// Reused scratch buffer for assembling string values which contain
    /// escape sequences
    scratch: String,
    line: u64,
    column: u64,
}

impl JsonStreamParser {
    /// Creates a parser in its idle state
    pub fn new() -> JsonStreamParser {
        JsonStreamParser {
            bom_checked: false,
            closed: false,
            failed: false,
            seen_value: false,
            stack: Vec::with_capacity(INITIAL_NESTING_CAPACITY),
            expect: Expect::Value,
            after_comma: false,
            pending: BytesMut::new(),
            scratch: String::new(),
            line: 1,
            column: 1,
        }
    }

    /// Line currently being processed, starting at 1
    ///
    /// During a handler callback this is the position just past the token
    /// which triggered the event.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Column currently being processed, starting at 1
    ///
    /// Every Unicode character counts as one column, regardless of the
    /// length of its UTF-8 encoding.
    pub fn column(&self) -> u64 {
        self.column
    }

    fn position(&self) -> LinePosition {
        LinePosition {
            line: self.line,
            column: self.column,
        }
    }

    /// Pushes bytes into the parser
    ///
    /// Events are delivered to the handler in document order, before this
    /// method returns. The buffer is always consumed completely; when it
    /// ends in the middle of a token, the parser carries the partial token
    /// over internally and resumes when more data arrives. The caller can
    /// refill the same buffer for the next call.
    ///
    /// # Errors
    /// Fails for malformed JSON data, for an unsupported byte order mark,
    /// when a handler callback fails, and when called after [`close`](Self::close)
    /// or after an earlier error. After an error the parser stays in a
    /// failed state; [`reset`](Self::reset) returns it to idle.
    pub fn receive<H: JsonContentHandler + ?Sized>(
        &mut self,
        data: &mut BytesMut,
        handler: &mut H,
    ) -> Result<(), JsonError> {
        if self.closed {
            return Err(self.error_here("Cannot receive data after close()"));
        }
        if self.failed {
            return Err(self.error_here("Cannot receive data after a parse error"));
        }
        if data.is_empty() {
            return Ok(());
        }

        if !self.pending.is_empty() {
            self.pending.extend_from_slice(data);
            data.clear();
            return self.drain_pending(handler);
        }

        let consumed = match self.drive(&data[..], handler) {
            Ok(consumed) => consumed,
            Err(e) => {
                self.failed = true;
                return Err(e);
            }
        };
        data.advance(consumed);
        if !data.is_empty() {
            self.pending.extend_from_slice(data);
            data.clear();
        }
        Ok(())
    }

    /// Signals the end of input and validates that the document is complete
    ///
    /// A trailing token without a delimiter (for example a top-level `42`)
    /// is completed and delivered to the handler by this call. Closing an
    /// already closed parser has no effect.
    ///
    /// # Errors
    /// Fails when no value was seen at all ("No data"), when an object or
    /// array is still open, or when the input ends inside a token.
    pub fn close<H: JsonContentHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), JsonError> {
        if self.closed {
            return Ok(());
        }
        if self.failed {
            return Err(self.error_here("Cannot close the parser after a parse error"));
        }
        self.closed = true;

        if !self.pending.is_empty() {
            self.drain_pending(handler)?;
            if !self.pending.is_empty() {
                self.failed = true;
                let message = if self.pending[0] == b'"' {
                    "Unclosed string"
                } else {
                    "Incomplete token at end of input"
                };
                return Err(self.error_here(message));
            }
        }

        if !self.seen_value {
            self.failed = true;
            return Err(self.error_here("No data"));
        }
        if let Some(container) = self.stack.last() {
            self.failed = true;
            let message = match container {
                Container::Object => "Unclosed object",
                Container::Array => "Unclosed array",
            };
            return Err(self.error_here(message));
        }
        Ok(())
    }

    /// Restores the parser to its idle state so it can parse a new document
    ///
    /// Internal buffers keep their capacity and are reused.
    pub fn reset(&mut self) {
        self.bom_checked = false;
        self.closed = false;
        self.failed = false;
        self.seen_value = false;
        self.stack.clear();
        self.expect = Expect::Value;
        self.after_comma = false;
        self.pending.clear();
        self.scratch.clear();
        self.line = 1;
        self.column = 1;
    }

    /// Parses a complete JSON document from a blocking reader
    ///
    /// This is a convenience method which reads the input in chunks and
    /// delegates to the streaming [`receive`](Self::receive) API, followed by
    /// [`close`](Self::close). The parser is reset first, so this method can
    /// be called repeatedly to parse multiple documents.
    ///
    /// If the reader returns an error of kind [`ErrorKind::Interrupted`] the
    /// read is retried.
    ///
    /// # Examples
    /// ```
    /// # use jsax::parser::{JsonContentHandler, JsonError, JsonStreamParser};
    /// #[derive(Default)]
    /// struct StringCollector {
    ///     strings: Vec<String>,
    /// }
    ///
    /// impl JsonContentHandler for StringCollector {
    ///     fn string_value(&mut self, value: &str) -> Result<(), JsonError> {
    ///         self.strings.push(value.to_owned());
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut parser = JsonStreamParser::new();
    /// let mut handler = StringCollector::default();
    /// parser.parse(r#"["a", "b"]"#.as_bytes(), &mut handler)?;
    /// assert_eq!(handler.strings, ["a", "b"]);
    /// # Ok::<(), jsax::parser::JsonError>(())
    /// ```
    pub fn parse<H: JsonContentHandler + ?Sized>(
        &mut self,
        mut input: impl Read,
        handler: &mut H,
    ) -> Result<(), JsonError> {
        self.reset();
        let mut chunk = [0_u8; PARSE_CHUNK_SIZE];
        let mut buffer = BytesMut::new();
        loop {
            let read = match input.read(&mut chunk) {
                Ok(read) => read,
                // Retry if interrupted
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(JsonError::with_cause("I/O error reading stream", e)),
            };
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            self.receive(&mut buffer, handler)?;
        }
        self.close(handler)
    }
}

// Implementation with the receive loop and buffer bookkeeping
impl JsonStreamParser {
    /// Runs the carried partial token through the tokenizer again, extended
    /// by whatever new data has been appended
    fn drain_pending<H: JsonContentHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), JsonError> {
        let pending = std::mem::take(&mut self.pending);
        let result = self.drive(&pending, handler);
        self.pending = pending;
        match result {
            Ok(consumed) => {
                self.pending.advance(consumed);
                if self.pending.is_empty() && self.pending.capacity() > PENDING_RETAIN_LIMIT {
                    self.pending = BytesMut::new();
                }
                Ok(())
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Consumes as many complete tokens from `buf` as possible and returns
    /// the number of bytes consumed
    fn drive<H: JsonContentHandler + ?Sized>(
        &mut self,
        buf: &[u8],
        handler: &mut H,
    ) -> Result<usize, JsonError> {
        let mut pos = 0;
        if !self.bom_checked {
            match self.check_bom(buf)? {
                None => return Ok(0),
                Some(consumed) => {
                    pos += consumed;
                    self.bom_checked = true;
                }
            }
        }
        while pos < buf.len() {
            match self.parse_one(&buf[pos..], handler)? {
                Some(consumed) => pos += consumed,
                None => break,
            }
        }
        Ok(pos)
    }

    /// Inspects the first bytes of the stream for a byte order mark
    ///
    /// Returns the number of bytes to skip (3 for a UTF-8 BOM, otherwise 0),
    /// or `None` when more bytes are needed to discriminate. UTF-16 and
    /// UTF-32 byte order marks fail, since only UTF-8 input is supported.
    fn check_bom(&mut self, data: &[u8]) -> Result<Option<usize>, JsonError> {
        match data[0] {
            0xEF => {
                if data.len() >= 3 {
                    if data[1] == 0xBB && data[2] == 0xBF {
                        return Ok(Some(3));
                    }
                    return Ok(Some(0));
                }
                if !self.closed && (data.len() == 1 || data[1] == 0xBB) {
                    // Might be a partial UTF-8 BOM
                    return Ok(None);
                }
                Ok(Some(0))
            }
            0xFE => {
                if data.len() < 2 {
                    return if self.closed { Ok(Some(0)) } else { Ok(None) };
                }
                if data[1] == 0xFF {
                    return Err(self.error_here("UTF-16 BE encoding not supported"));
                }
                Ok(Some(0))
            }
            0xFF => {
                if data.len() < 2 {
                    return if self.closed { Ok(Some(0)) } else { Ok(None) };
                }
                if data[1] != 0xFE {
                    return Ok(Some(0));
                }
                // UTF-16 LE and UTF-32 LE BOMs share the FF FE prefix
                if data.len() < 4 && !self.closed {
                    return Ok(None);
                }
                if data.len() >= 4 && data[2] == 0x00 && data[3] == 0x00 {
                    return Err(self.error_here("UTF-32 LE encoding not supported"));
                }
                Err(self.error_here("UTF-16 LE encoding not supported"))
            }
            0x00 => {
                if data.len() >= 4 {
                    if data[1] == 0x00 && data[2] == 0xFE && data[3] == 0xFF {
                        return Err(self.error_here("UTF-32 BE encoding not supported"));
                    }
                    return Ok(Some(0));
                }
                if self.closed {
                    return Ok(Some(0));
                }
                const UTF32_BE_BOM: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];
                if data.iter().zip(UTF32_BE_BOM.iter()).all(|(a, b)| a == b) {
                    // Might be a partial UTF-32 BE BOM
                    Ok(None)
                } else {
                    Ok(Some(0))
                }
            }
            _ => Ok(Some(0)),
        }
    }
}

// Implementation with the tokenizer and the structural state machine
impl JsonStreamParser {
    /// Recognizes the token starting at `data[0]`, delivers its event and
    /// returns its byte length, or `None` when the token cannot be completed
    /// with the available data
    ///
    /// Structural state, position counters and the handler are only touched
    /// once the token is complete; an underflow return leaves the parser
    /// exactly as it was, so the same token can be re-scanned once more data
    /// has arrived.
    fn parse_one<H: JsonContentHandler + ?Sized>(
        &mut self,
        data: &[u8],
        handler: &mut H,
    ) -> Result<Option<usize>, JsonError> {
        let b = data[0];

        if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
            let Some(run) = self.scan_whitespace(data) else {
                return Ok(None);
            };
            let whitespace = utf8::to_str_validated(&data[..run]);
            self.advance_position(whitespace);
            if handler.needs_whitespace() {
                handler.whitespace(whitespace)?;
            }
            return Ok(Some(run));
        }

        if self.stack.is_empty() && self.expect == Expect::AfterValue {
            return Err(self.error_here("Trailing content after document"));
        }

        match b {
            b'{' => {
                if self.expect != Expect::Value {
                    return Err(self.error_here("Unexpected '{'"));
                }
                self.column += 1;
                self.stack.push(Container::Object);
                self.expect = Expect::Key;
                self.after_comma = false;
                self.seen_value = true;
                handler.start_object()?;
                Ok(Some(1))
            }
            b'}' => {
                let in_object = self.stack.last() == Some(&Container::Object);
                if !in_object || !matches!(self.expect, Expect::Key | Expect::AfterValue) {
                    return Err(self.error_here("Unexpected '}'"));
                }
                if self.after_comma {
                    return Err(self.error_here("Trailing comma before '}'"));
                }
                self.column += 1;
                self.stack.pop();
                self.expect = Expect::AfterValue;
                handler.end_object()?;
                Ok(Some(1))
            }
            b'[' => {
                if self.expect != Expect::Value {
                    return Err(self.error_here("Unexpected '['"));
                }
                self.column += 1;
                self.stack.push(Container::Array);
                self.expect = Expect::Value;
                self.after_comma = false;
                self.seen_value = true;
                handler.start_array()?;
                Ok(Some(1))
            }
            b']' => {
                let in_array = self.stack.last() == Some(&Container::Array);
                // Expect::Value occurs only for an empty array, directly after '['
                if !in_array || !matches!(self.expect, Expect::Value | Expect::AfterValue) {
                    return Err(self.error_here("Unexpected ']'"));
                }
                if self.after_comma {
                    return Err(self.error_here("Trailing comma before ']'"));
                }
                self.column += 1;
                self.stack.pop();
                self.expect = Expect::AfterValue;
                handler.end_array()?;
                Ok(Some(1))
            }
            b',' => {
                if self.expect != Expect::AfterValue || self.stack.is_empty() {
                    return Err(self.error_here("Unexpected ','"));
                }
                self.column += 1;
                self.after_comma = true;
                self.expect = if self.stack.last() == Some(&Container::Object) {
                    Expect::Key
                } else {
                    Expect::Value
                };
                Ok(Some(1))
            }
            b':' => {
                if self.expect != Expect::Colon {
                    return Err(self.error_here("Unexpected ':'"));
                }
                self.column += 1;
                self.expect = Expect::Value;
                Ok(Some(1))
            }
            b'"' => {
                let is_key = match self.expect {
                    Expect::Value => false,
                    Expect::Key => true,
                    _ => return Err(self.error_here("Unexpected string")),
                };
                let Some(scanned) = self.scan_string(data)? else {
                    return Ok(None);
                };
                self.advance_position(utf8::to_str_validated(&data[..scanned.consumed]));
                self.after_comma = false;
                self.seen_value = true;
                let value = if scanned.uses_scratch {
                    self.scratch.as_str()
                } else {
                    utf8::to_str_validated(&data[1..scanned.close_quote])
                };
                if is_key {
                    handler.key(value)?;
                    self.expect = Expect::Colon;
                } else {
                    handler.string_value(value)?;
                    self.expect = Expect::AfterValue;
                }
                self.trim_scratch();
                Ok(Some(scanned.consumed))
            }
            b't' | b'f' | b'n' => {
                if self.expect != Expect::Value {
                    return Err(self.error_here("Unexpected literal"));
                }
                let remainder: &[u8] = match b {
                    b't' => b"rue",
                    b'f' => b"alse",
                    _ => b"ull",
                };
                let Some(consumed) = self.scan_literal(data, remainder)? else {
                    return Ok(None);
                };
                self.column += consumed as u64;
                self.after_comma = false;
                self.seen_value = true;
                self.expect = Expect::AfterValue;
                match b {
                    b't' => handler.boolean_value(true)?,
                    b'f' => handler.boolean_value(false)?,
                    _ => handler.null_value()?,
                }
                Ok(Some(consumed))
            }
            b'-' | b'0'..=b'9' => {
                if self.expect != Expect::Value {
                    return Err(self.error_here("Unexpected number"));
                }
                let Some((consumed, number)) = self.scan_number(data)? else {
                    return Ok(None);
                };
                // Number text is ASCII and contains no line breaks
                self.column += consumed as u64;
                self.after_comma = false;
                self.seen_value = true;
                self.expect = Expect::AfterValue;
                handler.number_value(number)?;
                Ok(Some(consumed))
            }
            _ => {
                if utf8::is_ascii(b) {
                    return Err(self.error_here(format!("Unexpected character: {}", b as char)));
                }
                match utf8::decode_char(data) {
                    utf8::DecodedChar::Char(c, _) => {
                        Err(self.error_here(format!("Unexpected character: {c}")))
                    }
                    utf8::DecodedChar::Incomplete if !self.closed => Ok(None),
                    _ => Err(self.error_here("Character decoding error")),
                }
            }
        }
    }

    /// Length of the whitespace run starting at `data[0]`, or `None` when
    /// the run reaches the end of the data and might continue
    fn scan_whitespace(&self, data: &[u8]) -> Option<usize> {
        let mut i = 0;
        while i < data.len() && matches!(data[i], b' ' | b'\t' | b'\n' | b'\r') {
            i += 1;
        }
        if i == data.len() && !self.closed {
            // The run is only maximal once a non-whitespace character or the
            // end of the document terminates it
            return None;
        }
        Some(i)
    }

    /// Scans the string token whose opening quote is at `data[0]`
    ///
    /// While the string contains no escape sequence the value is not
    /// materialized; it can be sliced directly out of `data`. On the first
    /// escape the already scanned prefix is copied into the scratch buffer
    /// and the remaining characters are appended as they are resolved.
    fn scan_string(&mut self, data: &[u8]) -> Result<Option<ScannedString>, JsonError> {
        debug_assert_eq!(b'"', data[0]);
        let mut uses_scratch = false;
        let mut i = 1;
        loop {
            if i >= data.len() {
                return if self.closed {
                    Err(self.error_at_offset(data, i, "Unclosed string"))
                } else {
                    Ok(None)
                };
            }
            match data[i] {
                b'"' => {
                    return Ok(Some(ScannedString {
                        consumed: i + 1,
                        close_quote: i,
                        uses_scratch,
                    }));
                }
                b'\\' => {
                    if !uses_scratch {
                        self.scratch.clear();
                        self.scratch.push_str(utf8::to_str_validated(&data[1..i]));
                        uses_scratch = true;
                    }
                    match self.scan_escape(data, i)? {
                        None => return Ok(None),
                        Some((len, c)) => {
                            self.scratch.push(c);
                            i += len;
                        }
                    }
                }
                b if b < 0x20 => {
                    return Err(self.error_at_offset(
                        data,
                        i,
                        "Unescaped control character in string",
                    ));
                }
                b if utf8::is_ascii(b) => {
                    if uses_scratch {
                        self.scratch.push(b as char);
                    }
                    i += 1;
                }
                _ => match utf8::decode_char(&data[i..]) {
                    utf8::DecodedChar::Char(c, len) => {
                        if uses_scratch {
                            self.scratch.push(c);
                        }
                        i += len;
                    }
                    utf8::DecodedChar::Incomplete if !self.closed => return Ok(None),
                    _ => {
                        return Err(self.error_at_offset(data, i, "Character decoding error"));
                    }
                },
            }
        }
    }

    /// Resolves the escape sequence starting with the backslash at
    /// `data[at]`, returning its source length and the escaped character
    fn scan_escape(&mut self, data: &[u8], at: usize) -> Result<Option<(usize, char)>, JsonError> {
        let rest = &data[at..];
        if rest.len() < 2 {
            return if self.closed {
                Err(self.error_at_offset(data, at, "Unclosed string"))
            } else {
                Ok(None)
            };
        }
        let c = match rest[1] {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{0008}',
            b'f' => '\u{000C}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => return self.scan_unicode_escape(data, at),
            b => {
                let message = if utf8::is_ascii(b) && !b.is_ascii_control() {
                    format!("Invalid escape sequence: \\{}", b as char)
                } else {
                    "Invalid escape sequence".to_owned()
                };
                return Err(self.error_at_offset(data, at, message));
            }
        };
        Ok(Some((2, c)))
    }

    /// Resolves a `\uXXXX` escape at `data[at]`, combining a UTF-16
    /// surrogate pair into the encoded supplementary character
    fn scan_unicode_escape(
        &mut self,
        data: &[u8],
        at: usize,
    ) -> Result<Option<(usize, char)>, JsonError> {
        let rest = &data[at..];
        if rest.len() < 6 {
            // Report a bad digit among the available characters right away
            // instead of waiting for data which cannot help anymore
            for (k, b) in rest[2..].iter().enumerate() {
                if !b.is_ascii_hexdigit() {
                    return Err(self.error_at_offset(data, at + 2 + k, "Invalid hex digit"));
                }
            }
            return if self.closed {
                Err(self.error_at_offset(data, at, "Incomplete Unicode escape"))
            } else {
                Ok(None)
            };
        }
        let unit = self.hex_unit(data, at + 2)?;

        if (0xDC00..=0xDFFF).contains(&unit) {
            return Err(self.error_at_offset(data, at, "Unpaired surrogate in escape sequence"));
        }
        if (0xD800..=0xDBFF).contains(&unit) {
            // High surrogate; an escaped low surrogate must follow
            if (rest.len() >= 7 && rest[6] != b'\\') || (rest.len() >= 8 && rest[7] != b'u') {
                return Err(self.error_at_offset(
                    data,
                    at,
                    "Unpaired surrogate in escape sequence",
                ));
            }
            if rest.len() < 12 {
                return if self.closed {
                    Err(self.error_at_offset(data, at, "Unpaired surrogate in escape sequence"))
                } else {
                    Ok(None)
                };
            }
            let low = self.hex_unit(data, at + 8)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(self.error_at_offset(
                    data,
                    at,
                    "Unpaired surrogate in escape sequence",
                ));
            }
            let code_point = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
            return match char::from_u32(code_point) {
                Some(c) => Ok(Some((12, c))),
                // A valid surrogate pair always combines into a valid char
                None => Err(self.error_at_offset(data, at, "Invalid Unicode escape")),
            };
        }

        match char::from_u32(unit) {
            Some(c) => Ok(Some((6, c))),
            // Surrogate values were excluded above
            None => Err(self.error_at_offset(data, at, "Invalid Unicode escape")),
        }
    }

    /// Parses the four hex digits at `data[start..start + 4]`
    fn hex_unit(&mut self, data: &[u8], start: usize) -> Result<u32, JsonError> {
        let mut value = 0_u32;
        for k in 0..4 {
            let digit = match data[start + k] {
                b @ b'0'..=b'9' => u32::from(b - b'0'),
                b @ b'a'..=b'f' => u32::from(b - b'a' + 10),
                b @ b'A'..=b'F' => u32::from(b - b'A' + 10),
                _ => return Err(self.error_at_offset(data, start + k, "Invalid hex digit")),
            };
            value = value << 4 | digit;
        }
        Ok(value)
    }

    /// Scans the number token starting at `data[0]`, strict per the RFC 8259
    /// grammar
    ///
    /// Since `.`, `e` and `E` can validly follow digits, completion needs one
    /// character of lookahead; when that character is not available and the
    /// stream is not closed the scan underflows.
    fn scan_number(&mut self, data: &[u8]) -> Result<Option<(usize, JsonNumber)>, JsonError> {
        let mut i = 0;
        if data[i] == b'-' {
            i += 1;
            if i >= data.len() {
                return if self.closed {
                    Err(self.error_at_offset(data, i, "Invalid number: expected digit"))
                } else {
                    Ok(None)
                };
            }
        }
        match data[i] {
            b'0' => {
                i += 1;
                if i < data.len() && data[i].is_ascii_digit() {
                    return Err(self.error_at_offset(data, i, "Numbers cannot have leading zeros"));
                }
            }
            b'1'..=b'9' => {
                while i < data.len() && data[i].is_ascii_digit() {
                    i += 1;
                }
            }
            _ => return Err(self.error_at_offset(data, i, "Invalid number: expected digit")),
        }

        if i < data.len() && data[i] == b'.' {
            i += 1;
            if i >= data.len() {
                return if self.closed {
                    Err(self.error_at_offset(data, i, "Decimal point must be followed by digit"))
                } else {
                    Ok(None)
                };
            }
            if !data[i].is_ascii_digit() {
                return Err(self.error_at_offset(
                    data,
                    i,
                    "Decimal point must be followed by digit",
                ));
            }
            while i < data.len() && data[i].is_ascii_digit() {
                i += 1;
            }
        }

        if i < data.len() && (data[i] == b'e' || data[i] == b'E') {
            i += 1;
            if i < data.len() && (data[i] == b'+' || data[i] == b'-') {
                i += 1;
            }
            if i >= data.len() {
                return if self.closed {
                    Err(self.error_at_offset(data, i, "Exponent must have digit"))
                } else {
                    Ok(None)
                };
            }
            if !data[i].is_ascii_digit() {
                return Err(self.error_at_offset(data, i, "Exponent must have digit"));
            }
            while i < data.len() && data[i].is_ascii_digit() {
                i += 1;
            }
        }

        if i >= data.len() && !self.closed {
            // The number may still continue with a fraction, exponent or
            // further digits
            return Ok(None);
        }

        let text = utf8::to_str_validated(&data[..i]);
        match JsonNumber::from_literal(text) {
            Some(number) => Ok(Some((i, number))),
            None => {
                let message = format!("Invalid number: {text}");
                Err(self.error_at_offset(data, 0, message))
            }
        }
    }

    /// Checks the literal whose first character at `data[0]` has already been
    /// dispatched on, requiring exactly the remaining characters
    fn scan_literal(&mut self, data: &[u8], remainder: &[u8]) -> Result<Option<usize>, JsonError> {
        let needed = 1 + remainder.len();
        if data.len() < needed {
            // A mismatch is a hard error even before all characters arrived
            if data[1..].iter().zip(remainder.iter()).any(|(a, b)| a != b) || self.closed {
                return Err(self.error_at_offset(data, 0, "Invalid literal"));
            }
            return Ok(None);
        }
        if &data[1..needed] != remainder {
            return Err(self.error_at_offset(data, 0, "Invalid literal"));
        }
        Ok(Some(needed))
    }
}

// Implementation with position tracking and error creation
impl JsonStreamParser {
    /// Advances the line/column counters over consumed source text
    fn advance_position(&mut self, text: &str) {
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.column = 1;
                }
                '\r' => {
                    self.line += 1;
                    self.column = 1;
                    // CR LF counts as a single line break
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                }
                _ => self.column += 1,
            }
        }
    }

    fn error_here(&self, message: impl Into<String>) -> JsonError {
        JsonError::at(message, self.position())
    }

    /// Creates an error pointing at the character at `token[offset]`
    ///
    /// The token prefix before the offset has already been validated as
    /// UTF-8 by the scanners, so the counters can be advanced over it. The
    /// parser is terminal after any error, making the mutation harmless.
    fn error_at_offset(
        &mut self,
        token: &[u8],
        offset: usize,
        message: impl Into<String>,
    ) -> JsonError {
        self.advance_position(utf8::to_str_validated(&token[..offset]));
        JsonError::at(message, self.position())
    }

    fn trim_scratch(&mut self) {
        if self.scratch.capacity() > SCRATCH_RETAIN_LIMIT {
            self.scratch = String::new();
        }
    }
}

impl Default for JsonStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct NullHandler;
    impl JsonContentHandler for NullHandler {}

    #[derive(Default)]
    struct EventCounter {
        events: usize,
    }
    impl JsonContentHandler for EventCounter {
        fn start_array(&mut self) -> Result<(), JsonError> {
            self.events += 1;
            Ok(())
        }
        fn end_array(&mut self) -> Result<(), JsonError> {
            self.events += 1;
            Ok(())
        }
        fn number_value(&mut self, _value: JsonNumber) -> Result<(), JsonError> {
            self.events += 1;
            Ok(())
        }
    }

    fn receive_str(
        parser: &mut JsonStreamParser,
        handler: &mut impl JsonContentHandler,
        json: &str,
    ) -> Result<(), JsonError> {
        let mut buffer = BytesMut::from(json.as_bytes());
        parser.receive(&mut buffer, handler)
    }

    #[test]
    fn position_tracking() -> Result<(), JsonError> {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        receive_str(&mut parser, &mut handler, "{\r\n  \"a\": [1,\n    2]\n}")?;
        parser.close(&mut handler)?;
        assert_eq!(4, parser.line());
        assert_eq!(2, parser.column());
        Ok(())
    }

    #[test]
    fn error_position() {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        let e = receive_str(&mut parser, &mut handler, "[\n1x]").unwrap_err();
        assert_eq!("Unexpected character: x", e.message());
        let location = e.location().unwrap();
        assert_eq!(2, location.line);
        assert_eq!(2, location.column);
    }

    #[test]
    fn error_position_inside_string() {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        let e = receive_str(&mut parser, &mut handler, "\"ab\u{1}\"").unwrap_err();
        assert_eq!("Unescaped control character in string", e.message());
        // Column 4: the quote and both chars precede the control character
        assert_eq!(4, e.location().unwrap().column);
    }

    #[test]
    fn trailing_content() {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        let e = receive_str(&mut parser, &mut handler, "{} []").unwrap_err();
        assert_eq!("Trailing content after document", e.message());
    }

    #[test]
    fn failed_state_is_terminal() {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        receive_str(&mut parser, &mut handler, "[}").unwrap_err();
        let e = receive_str(&mut parser, &mut handler, "1").unwrap_err();
        assert_eq!("Cannot receive data after a parse error", e.message());
        let e = parser.close(&mut handler).unwrap_err();
        assert_eq!("Cannot close the parser after a parse error", e.message());
    }

    #[test]
    fn receive_after_close() -> Result<(), JsonError> {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        receive_str(&mut parser, &mut handler, "[]")?;
        parser.close(&mut handler)?;
        // close() is idempotent
        parser.close(&mut handler)?;
        let e = receive_str(&mut parser, &mut handler, "[]").unwrap_err();
        assert_eq!("Cannot receive data after close()", e.message());
        Ok(())
    }

    #[test]
    fn reset_allows_reuse() -> Result<(), JsonError> {
        let mut parser = JsonStreamParser::new();
        let mut handler = EventCounter::default();
        receive_str(&mut parser, &mut handler, "[1]")?;
        parser.close(&mut handler)?;
        parser.reset();
        receive_str(&mut parser, &mut handler, "[2]")?;
        parser.close(&mut handler)?;
        assert_eq!(6, handler.events);
        assert_eq!(1, parser.line());
        Ok(())
    }

    #[test]
    fn close_completes_trailing_number() -> Result<(), JsonError> {
        let mut parser = JsonStreamParser::new();
        let mut handler = EventCounter::default();
        receive_str(&mut parser, &mut handler, "42")?;
        // No delimiter yet, so the number is still pending
        assert_eq!(0, handler.events);
        parser.close(&mut handler)?;
        assert_eq!(1, handler.events);
        Ok(())
    }

    #[test]
    fn scratch_capacity_is_capped() -> Result<(), JsonError> {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        let json = format!("\"\\n{}\"", "a".repeat(SCRATCH_RETAIN_LIMIT * 2));
        receive_str(&mut parser, &mut handler, &json)?;
        parser.close(&mut handler)?;
        assert!(parser.scratch.capacity() <= SCRATCH_RETAIN_LIMIT);
        Ok(())
    }

    #[test]
    fn pending_capacity_is_capped() -> Result<(), JsonError> {
        let mut parser = JsonStreamParser::new();
        let mut handler = NullHandler;
        let value = "a".repeat(PENDING_RETAIN_LIMIT * 2);
        // First chunk ends inside the string, forcing the carry buffer to grow
        receive_str(&mut parser, &mut handler, &format!("\"{value}"))?;
        receive_str(&mut parser, &mut handler, "\"")?;
        parser.close(&mut handler)?;
        assert!(parser.pending.capacity() <= PENDING_RETAIN_LIMIT);
        Ok(())
    }
}
