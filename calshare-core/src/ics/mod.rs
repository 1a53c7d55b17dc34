//! ICS document generation and parsing.
//!
//! This module turns draft sets into .ics documents according to RFC 5545 and
//! reads them back.

mod generate;
mod parse;
mod text;

pub use generate::{build_document, generate_ics};
pub use parse::{ParsedEvent, parse_document};
pub use text::unescape_text;
