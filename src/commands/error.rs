//! Command Errors
//!
//! Every handler in the dispatch tree returns [`CommandError`]. Errors pass
//! up through nested dispatchers untouched so the outermost caller can still
//! tell a typo from a broken backend.
//!
//! ## Visibility
//!
//! ```text
//! user errors      UnknownCommand, NameRequired, PositiveValueRequired,
//!                  InvalidCount, CharacterNotFound, InvalidName,
//!                  CharacterExists
//!                  -> shown to the user as-is
//!
//! internal errors  MissingHandler, Persistence
//!                  -> logged, user sees GENERIC_FAILURE
//! ```

use crate::storage::StorageError;
use std::num::ParseIntError;
use thiserror::Error;

/// Text shown to users in place of an internal error.
pub const GENERIC_FAILURE: &str = "something went wrong";

/// Errors produced while dispatching or executing a command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The token is not valid at this dispatch level
    #[error("unknown command '{token}' (usage: {usage})")]
    UnknownCommand { token: String, usage: String },

    /// The token is whitelisted but no handler was registered for it
    #[error("no handler registered for command '{0}'")]
    MissingHandler(String),

    /// The name argument was empty after trimming
    #[error("{0} name required")]
    NameRequired(&'static str),

    /// A negative count was supplied
    #[error("positive value required")]
    PositiveValueRequired,

    /// The count suffix is not a usable integer
    #[error("could not interpret count '{input}': {source}")]
    InvalidCount {
        input: String,
        #[source]
        source: ParseIntError,
    },

    /// The caller has no character with this name
    #[error("could not find character '{0}'")]
    CharacterNotFound(String),

    /// The name cannot be used as a command token
    #[error("invalid name '{0}': names cannot contain whitespace")]
    InvalidName(String),

    /// The caller already has a character with this name
    #[error("character '{0}' already exists")]
    CharacterExists(String),

    /// The storage collaborator failed
    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: StorageError,
    },
}

impl CommandError {
    /// Wraps a storage failure with a short description of what was being done.
    pub fn persistence(context: &'static str, source: StorageError) -> Self {
        Self::Persistence { context, source }
    }

    /// Returns true for configuration and backend failures.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::MissingHandler(_) | Self::Persistence { .. })
    }

    /// Returns the text that may be shown to the caller.
    pub fn user_message(&self) -> String {
        if self.is_internal() {
            GENERIC_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }
}

/// Interprets a count suffix produced by [`crate::parser::maybe_count`].
///
/// An empty suffix means 1.
pub fn parse_count(count: &str) -> Result<u64, CommandError> {
    let count = count.trim();
    if count.is_empty() {
        return Ok(1);
    }

    let value: i64 = count.parse().map_err(|source| CommandError::InvalidCount {
        input: count.to_string(),
        source,
    })?;

    if value < 0 {
        return Err(CommandError::PositiveValueRequired);
    }

    Ok(value.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_defaults_to_one() {
        assert_eq!(parse_count(""), Ok(1));
        assert_eq!(parse_count("  "), Ok(1));
    }

    #[test]
    fn test_parse_count_value() {
        assert_eq!(parse_count("3"), Ok(3));
        assert_eq!(parse_count("0"), Ok(0));
    }

    #[test]
    fn test_parse_count_negative() {
        assert_eq!(parse_count("-3"), Err(CommandError::PositiveValueRequired));
    }

    #[test]
    fn test_parse_count_invalid() {
        for input in ["abc", "3x", "99999999999999999999999"] {
            assert!(matches!(
                parse_count(input),
                Err(CommandError::InvalidCount { .. })
            ));
        }
    }

    #[test]
    fn test_internal_errors_are_hidden() {
        let missing = CommandError::MissingHandler("help".to_string());
        let storage = CommandError::persistence(
            "could not save item need",
            StorageError::Conflict("alice".to_string()),
        );

        assert!(missing.is_internal());
        assert!(storage.is_internal());
        assert_eq!(missing.user_message(), GENERIC_FAILURE);
        assert_eq!(storage.user_message(), GENERIC_FAILURE);
        assert_eq!(
            storage.to_string(),
            "could not save item need: concurrent update to user 'alice'"
        );
    }

    #[test]
    fn test_user_errors_are_shown() {
        let err = CommandError::UnknownCommand {
            token: "craft".to_string(),
            usage: "!need [type]".to_string(),
        };
        assert!(!err.is_internal());
        assert_eq!(
            err.user_message(),
            "unknown command 'craft' (usage: !need [type])"
        );
        assert_eq!(
            CommandError::NameRequired("item").user_message(),
            "item name required"
        );
    }
}
