//! Component A: the line-oriented wire protocol.
//!
//! A line is parsed into a [`Message`] — an optional source, an uppercased
//! command token, and a list of parameters — and a [`Message`] can be
//! rendered back to a line with [`Message::to_line`]. The two directions are
//! inverses of each other for every message this daemon constructs; see
//! `tests/parser.rs` for the round-trip law.
//!
//! This module also carries the three-digit numeric reply table
//! ([`response`]) used by the command dispatcher.

pub mod command;
mod message;
mod parse;
pub mod response;

pub use command::Command;
pub use message::Message;
pub use parse::ParseError;

/// Maximum raw line length per RFC 2812, excluding the line terminator.
pub const MAX_LINE_LEN: usize = 512;
