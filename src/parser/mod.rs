//! Command Line Parser
//!
//! This module turns a raw chat line into a routing decision.
//!
//! ## Overview
//!
//! A command line is a token followed by a remainder:
//!
//! ```text
//! "item Bob sword 3"
//!  ^^^^ ^^^^^^^^^^^
//!  token remainder
//! ```
//!
//! The token must be a member of the parser's whitelist of known commands.
//! The remainder is handed down unchanged (apart from trimming) so the next
//! dispatch level can parse it again with its own whitelist.
//!
//! ## Modules
//!
//! - `tokenizer`: the whitelisting `Parser`
//! - `count`: extraction of an optional trailing count (`"sword 3"`)
//!
//! ## Example
//!
//! ```
//! use needbot::parser::{maybe_count, Parser, ParserOptions};
//!
//! let parser = Parser::new(ParserOptions::new(' ', ["", "item", "pts"]));
//!
//! let (token, rest) = parser.parse("item Bob sword 3").unwrap();
//! assert_eq!(token, "item");
//! assert_eq!(rest, "Bob sword 3");
//!
//! let (name, count) = maybe_count("sword 3");
//! assert_eq!(name, "sword");
//! assert_eq!(count, "3");
//! ```

pub mod count;
pub mod tokenizer;

pub use count::maybe_count;
pub use tokenizer::{ParseError, Parser, ParserOptions};
