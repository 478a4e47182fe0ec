//! Shared test helpers: an event-recording handler and chunked-feed drivers
#![allow(dead_code)]

use bytes::BytesMut;
use jsax::parser::{JsonContentHandler, JsonError, JsonStreamParser};
use jsax::JsonNumber;

/// Handler which records every event as a readable string
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Vec<String>,
    pub record_whitespace: bool,
}

impl JsonContentHandler for RecordingHandler {
    fn start_object(&mut self) -> Result<(), JsonError> {
        self.events.push("start-object".to_owned());
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), JsonError> {
        self.events.push("end-object".to_owned());
        Ok(())
    }

    fn start_array(&mut self) -> Result<(), JsonError> {
        self.events.push("start-array".to_owned());
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), JsonError> {
        self.events.push("end-array".to_owned());
        Ok(())
    }

    fn key(&mut self, key: &str) -> Result<(), JsonError> {
        self.events.push(format!("key({key})"));
        Ok(())
    }

    fn string_value(&mut self, value: &str) -> Result<(), JsonError> {
        self.events.push(format!("string({value})"));
        Ok(())
    }

    fn number_value(&mut self, value: JsonNumber) -> Result<(), JsonError> {
        let text = match &value {
            JsonNumber::I32(v) => format!("i32 {v}"),
            JsonNumber::I64(v) => format!("i64 {v}"),
            JsonNumber::BigInt(v) => format!("big {v}"),
            // Debug form keeps ".0" on integral floats
            JsonNumber::F64(v) => format!("f64 {v:?}"),
        };
        self.events.push(format!("number({text})"));
        Ok(())
    }

    fn boolean_value(&mut self, value: bool) -> Result<(), JsonError> {
        self.events.push(format!("boolean({value})"));
        Ok(())
    }

    fn null_value(&mut self) -> Result<(), JsonError> {
        self.events.push("null".to_owned());
        Ok(())
    }

    fn whitespace(&mut self, whitespace: &str) -> Result<(), JsonError> {
        self.events.push(format!("whitespace({whitespace:?})"));
        Ok(())
    }

    fn needs_whitespace(&self) -> bool {
        self.record_whitespace
    }
}

/// Feeds the document in chunks of at most `chunk_size` bytes and returns
/// the recorded events together with the parse result
pub fn parse_outcome(
    json: &[u8],
    chunk_size: usize,
    record_whitespace: bool,
) -> (Vec<String>, Result<(), JsonError>) {
    let mut parser = JsonStreamParser::new();
    let mut handler = RecordingHandler {
        events: Vec::new(),
        record_whitespace,
    };
    let mut buffer = BytesMut::new();
    for chunk in json.chunks(chunk_size.max(1)) {
        buffer.extend_from_slice(chunk);
        if let Err(e) = parser.receive(&mut buffer, &mut handler) {
            return (handler.events, Err(e));
        }
    }
    let result = parser.close(&mut handler);
    (handler.events, result)
}

/// Parses a complete document in one chunk, asserting success
pub fn parse_events(json: &str) -> Vec<String> {
    let (events, result) = parse_outcome(json.as_bytes(), json.len().max(1), false);
    result.unwrap_or_else(|e| panic!("should have parsed {json:?}, but failed with: {e}"));
    events
}

/// Parses a document expected to be malformed, returning the error
pub fn parse_error(json: &str) -> JsonError {
    let (_, result) = parse_outcome(json.as_bytes(), json.len().max(1), false);
    match result {
        Ok(()) => panic!("should have failed for {json:?}"),
        Err(e) => e,
    }
}
