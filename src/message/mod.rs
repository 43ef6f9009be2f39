//! Decoding of inbound stream payloads

mod parser;

pub use parser::{parse_event, parse_event_value};
