//! Whitelisting Command Tokenizer
//!
//! The parser splits an input line at the first command indicator character
//! and validates the leading token against a closed set of known commands.
//!
//! ## Normalization Rules
//!
//! 1. The whole input is trimmed before splitting.
//! 2. When the indicator is whitespace, any whitespace character splits.
//! 3. Token and remainder are both trimmed.
//! 4. Empty and whitespace-only input produce the empty token `""`.
//!
//! Rule 4 is what makes a bare command (`"!need item"`) fall through to the
//! help handler: the next level sees an empty line and routes it to `""`.
//!
//! Token comparison is exact. `"Item"` and `"item"` are different commands.

use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur while parsing a command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The leading token is not in the whitelist
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

/// Configuration for a [`Parser`].
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Character separating the token from the remainder
    pub cmd_indicator: char,

    /// Tokens accepted by this parser (`""` is a valid member)
    pub known_commands: HashSet<String>,
}

impl ParserOptions {
    /// Creates options from an indicator and any iterable of command names.
    pub fn new<I, S>(cmd_indicator: char, known_commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd_indicator,
            known_commands: known_commands.into_iter().map(Into::into).collect(),
        }
    }
}

/// A command tokenizer with a fixed whitelist.
///
/// The whitelist cannot change once the parser is built. Levels whose valid
/// tokens depend on the caller (character names, for example) build a fresh
/// parser per invocation instead of mutating a shared one.
#[derive(Debug, Clone)]
pub struct Parser {
    cmd_indicator: char,
    known_commands: HashSet<String>,
}

impl Parser {
    /// Creates a new parser.
    pub fn new(options: ParserOptions) -> Self {
        Self {
            cmd_indicator: options.cmd_indicator,
            known_commands: options.known_commands,
        }
    }

    /// Splits `input` into a whitelisted token and the trimmed remainder.
    ///
    /// # Returns
    ///
    /// - `Ok((token, remainder))` - the token is a known command
    /// - `Err(ParseError::UnknownCommand)` - the token is not whitelisted
    pub fn parse<'i>(&self, input: &'i str) -> Result<(&'i str, &'i str), ParseError> {
        let (token, remainder) = self.split(input.trim());

        if !self.known_commands.contains(token) {
            return Err(ParseError::UnknownCommand(token.to_string()));
        }

        Ok((token, remainder))
    }

    /// Returns true if `token` is whitelisted.
    pub fn is_known(&self, token: &str) -> bool {
        self.known_commands.contains(token)
    }

    /// Returns the whitelist in sorted order.
    pub fn known_commands(&self) -> Vec<&str> {
        let mut commands: Vec<&str> = self.known_commands.iter().map(String::as_str).collect();
        commands.sort_unstable();
        commands
    }

    /// Returns the configured indicator character.
    pub fn cmd_indicator(&self) -> char {
        self.cmd_indicator
    }

    fn split<'i>(&self, line: &'i str) -> (&'i str, &'i str) {
        let position = if self.cmd_indicator.is_whitespace() {
            line.find(char::is_whitespace)
        } else {
            line.find(self.cmd_indicator)
        };

        match position {
            Some(pos) => {
                let token = line[..pos].trim();
                let indicator_len = line[pos..].chars().next().map_or(0, char::len_utf8);
                (token, line[pos + indicator_len..].trim())
            }
            None => (line, ""),
        }
    }
}
