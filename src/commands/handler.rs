//! Recursive Command Dispatcher
//!
//! This module implements the routing core of the bot. A [`CommandHandler`]
//! owns a [`Parser`] and a registry mapping tokens to [`LineHandler`]s.
//! Because `CommandHandler` is itself a `LineHandler`, dispatchers nest:
//!
//! ```text
//! "need item Bob sword 3"
//!       │
//!       ▼
//! ┌──────────────────────┐   token "need"
//! │ root CommandHandler  │───────────────┐
//! └──────────────────────┘               ▼
//!                          ┌──────────────────────┐   token "item"
//!                          │ need CommandHandler  │───────────────┐
//!                          └──────────────────────┘               ▼
//!                                               ┌──────────────────────────┐
//!                                               │ per-caller dispatcher    │
//!                                               │ tokens = character names │
//!                                               └────────────┬─────────────┘
//!                                                 token "Bob"│ "sword 3"
//!                                                            ▼
//!                                                     leaf LineHandler
//! ```
//!
//! Each level re-parses the remainder with its own whitelist. The remainder a
//! handler receives never contains its own token.

use crate::commands::error::CommandError;
use crate::parser::{ParseError, Parser};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, trace};

/// A unit of work addressed by a command line.
///
/// `caller` is the identity the line is processed for; `args` is whatever
/// followed the token that routed here.
pub trait LineHandler: Send + Sync {
    fn handle_line(&self, caller: &str, args: &str) -> Result<String, CommandError>;
}

impl<T> LineHandler for Arc<T>
where
    T: LineHandler + ?Sized,
{
    fn handle_line(&self, caller: &str, args: &str) -> Result<String, CommandError> {
        (**self).handle_line(caller, args)
    }
}

/// Adapts a plain function or closure into a [`LineHandler`].
pub struct LineHandlerFn<F> {
    f: F,
}

impl<F> LineHandler for LineHandlerFn<F>
where
    F: Fn(&str, &str) -> Result<String, CommandError> + Send + Sync,
{
    fn handle_line(&self, caller: &str, args: &str) -> Result<String, CommandError> {
        (self.f)(caller, args)
    }
}

/// Wraps `f` so it can be registered with [`CommandHandler::set_handler`].
pub fn line_handler_fn<F>(f: F) -> LineHandlerFn<F>
where
    F: Fn(&str, &str) -> Result<String, CommandError> + Send + Sync,
{
    LineHandlerFn { f }
}

/// Text used to describe a dispatch level in usage and help output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandHandlerOptions {
    /// Everything the user typed to reach this level (`"!need item"`)
    pub pre_command: String,

    /// Name of the argument this level expects (`"charname"`)
    pub placeholder: String,
}

impl CommandHandlerOptions {
    pub fn new(pre_command: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            pre_command: pre_command.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Formats `"<pre_command> [<placeholder>]"`.
    ///
    /// A bare prefix such as `"!"` is joined without a space (`"![command]"`).
    pub fn usage(&self) -> String {
        let sep = if self.pre_command.ends_with(char::is_alphanumeric) {
            " "
        } else {
            ""
        };
        format!("{}{}[{}]", self.pre_command, sep, self.placeholder)
    }
}

/// Routes command lines to registered handlers.
///
/// The lifetime lets a dispatcher built for one invocation borrow state that
/// only lives for that invocation. Long-lived dispatchers are
/// `CommandHandler<'static>`.
pub struct CommandHandler<'a> {
    parser: Parser,
    options: CommandHandlerOptions,
    handlers: HashMap<String, Box<dyn LineHandler + 'a>>,
}

impl std::fmt::Debug for CommandHandler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tokens: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tokens.sort_unstable();

        f.debug_struct("CommandHandler")
            .field("parser", &self.parser)
            .field("options", &self.options)
            .field("handlers", &tokens)
            .finish()
    }
}

impl<'a> CommandHandler<'a> {
    /// Creates a dispatcher with an empty registry.
    pub fn new(parser: Parser, options: CommandHandlerOptions) -> Self {
        Self {
            parser,
            options,
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `token`, replacing any previous one.
    pub fn set_handler(&mut self, token: impl Into<String>, handler: impl LineHandler + 'a) {
        self.handlers.insert(token.into(), Box::new(handler));
    }

    /// Returns true if a handler is registered for `token`.
    pub fn has_handler(&self, token: &str) -> bool {
        self.handlers.contains_key(token)
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn options(&self) -> &CommandHandlerOptions {
        &self.options
    }

    /// Returns the one-line usage hint for this level.
    pub fn usage(&self) -> String {
        self.options.usage()
    }

    /// Parses `args` and hands the remainder to the handler for its token.
    ///
    /// Errors from the selected handler are returned unchanged.
    pub fn handle_line(&self, caller: &str, args: &str) -> Result<String, CommandError> {
        let (token, remainder) = self.parser.parse(args).map_err(|e| match e {
            ParseError::UnknownCommand(token) => CommandError::UnknownCommand {
                token,
                usage: self.usage(),
            },
        })?;

        let Some(handler) = self.handlers.get(token) else {
            error!(
                token = token,
                pre_command = %self.options.pre_command,
                "Whitelisted command has no handler"
            );
            return Err(CommandError::MissingHandler(token.to_string()));
        };

        trace!(caller = caller, token = token, "Dispatching command");
        handler.handle_line(caller, remainder)
    }
}

impl LineHandler for CommandHandler<'_> {
    fn handle_line(&self, caller: &str, args: &str) -> Result<String, CommandError> {
        CommandHandler::handle_line(self, caller, args)
    }
}
