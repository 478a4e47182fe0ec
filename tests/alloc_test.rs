//! Allocation regression tests for the constant-memory property: once the
//! parser and writer buffers exist, primitive events must not allocate

use std::error::Error;

// Only use import when creating debug builds, see also configuration below
#[cfg(debug_assertions)]
use assert_no_alloc::AllocDisabler;
use bytes::BytesMut;
use jsax::parser::{JsonContentHandler, JsonError, JsonStreamParser};
use jsax::writer::{JsonStreamWriter, JsonWriter};
use jsax::JsonNumber;

// Only enable when creating debug builds
#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

fn assert_no_alloc<F: FnOnce() -> Result<(), Box<dyn Error>>>(func: F) {
    assert_no_alloc::assert_no_alloc(func).unwrap()
}

/// Handler which looks at every event without retaining anything
#[derive(Default)]
struct CountingHandler {
    events: usize,
    string_bytes: usize,
}

impl JsonContentHandler for CountingHandler {
    fn start_object(&mut self) -> Result<(), JsonError> {
        self.events += 1;
        Ok(())
    }
    fn end_object(&mut self) -> Result<(), JsonError> {
        self.events += 1;
        Ok(())
    }
    fn start_array(&mut self) -> Result<(), JsonError> {
        self.events += 1;
        Ok(())
    }
    fn end_array(&mut self) -> Result<(), JsonError> {
        self.events += 1;
        Ok(())
    }
    fn key(&mut self, key: &str) -> Result<(), JsonError> {
        self.events += 1;
        self.string_bytes += key.len();
        Ok(())
    }
    fn string_value(&mut self, value: &str) -> Result<(), JsonError> {
        self.events += 1;
        self.string_bytes += value.len();
        Ok(())
    }
    fn number_value(&mut self, _value: JsonNumber) -> Result<(), JsonError> {
        self.events += 1;
        Ok(())
    }
    fn boolean_value(&mut self, _value: bool) -> Result<(), JsonError> {
        self.events += 1;
        Ok(())
    }
    fn null_value(&mut self) -> Result<(), JsonError> {
        self.events += 1;
        Ok(())
    }
}

#[test]
fn parse_without_allocation() {
    // Strings without escape sequences are sliced out of the input buffer,
    // so nothing here requires the parser to allocate
    let json = br#"{"a": [true, false, null, 12, -7, 1.5], "plain": "string value"}"#;
    let mut parser = JsonStreamParser::new();
    let mut handler = CountingHandler::default();
    let mut buffer = BytesMut::from(&json[..]);

    assert_no_alloc(|| {
        parser.receive(&mut buffer, &mut handler)?;
        parser.close(&mut handler)?;
        Ok(())
    });

    assert_eq!(13, handler.events);
    assert_eq!("aplainstring value".len(), handler.string_bytes);
}

#[test]
fn write_without_allocation() {
    // Pre-allocate so the Vec never grows during the test
    let mut bytes = Vec::with_capacity(4096);
    let mut json_writer = JsonStreamWriter::new(&mut bytes);

    assert_no_alloc(|| {
        json_writer.begin_object()?;
        json_writer.key("a")?;
        json_writer.begin_array()?;
        json_writer.string_value("escaped \n\t value")?;
        json_writer.number_value(123)?;
        json_writer.number_value(4.5)?;
        json_writer.bool_value(true)?;
        json_writer.null_value()?;
        json_writer.end_array()?;
        json_writer.end_object()?;
        json_writer.flush()?;
        Ok(())
    });

    drop(json_writer);
    assert_eq!(
        r#"{"a":["escaped \n\t value",123,4.5,true,null]}"#,
        String::from_utf8(bytes).unwrap()
    );
}
