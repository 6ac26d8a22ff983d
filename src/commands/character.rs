//! The `char` Command Family
//!
//! Manages the characters that `need` routes to:
//!
//! ```text
//! !char create <name>
//! !char delete <name>
//! !char show <name>
//! !char list
//! ```
//!
//! Character names become command tokens one level down, so they must be a
//! single word.

use crate::commands::error::CommandError;
use crate::commands::handler::{line_handler_fn, CommandHandler, CommandHandlerOptions};
use crate::commands::help::usage_text;
use crate::parser::{Parser, ParserOptions};
use crate::storage::{begin, StorageError, TxGuard, User, UserApi};
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

const SUBCOMMANDS: [&str; 4] = ["create", "delete", "list", "show"];

#[derive(Clone)]
struct CharCommands {
    api: Arc<dyn UserApi>,
}

impl CharCommands {
    fn create(&self, caller: &str, args: &str) -> Result<String, CommandError> {
        let name = character_name(args)?;

        let mut tx = self.writable()?;
        let mut user = load_or_create(&mut tx, caller)?;

        user.add_character(name).map_err(|e| match e {
            StorageError::CharacterExists(name) => CommandError::CharacterExists(name),
            other => CommandError::persistence("could not add character", other),
        })?;

        save(tx, &user, "could not save character")?;
        info!(caller = caller, character = name, "Character created");
        Ok(format!("created character {}", name))
    }

    fn delete(&self, caller: &str, args: &str) -> Result<String, CommandError> {
        let name = character_name(args)?;

        let mut tx = self.writable()?;
        let mut user = match tx.get_user(caller) {
            Ok(user) => user,
            Err(StorageError::UserNotFound(_)) => {
                return Err(CommandError::CharacterNotFound(name.to_string()))
            }
            Err(e) => return Err(CommandError::persistence("could not load user", e)),
        };

        user.remove_character(name)
            .map_err(|_| CommandError::CharacterNotFound(name.to_string()))?;

        save(tx, &user, "could not delete character")?;
        info!(caller = caller, character = name, "Character deleted");
        Ok(format!("deleted character {}", name))
    }

    fn show(&self, caller: &str, args: &str) -> Result<String, CommandError> {
        let name = character_name(args)?;

        let user = self
            .read(caller)?
            .ok_or_else(|| CommandError::CharacterNotFound(name.to_string()))?;
        let character = user
            .character(name)
            .ok_or_else(|| CommandError::CharacterNotFound(name.to_string()))?;

        if character.needed_items().is_empty() && character.needed_skills().is_empty() {
            return Ok(format!("{} has no needs", character.name()));
        }

        let mut out = format!("{}\n", character.name());
        if !character.needed_items().is_empty() {
            out.push_str("  items:\n");
            for (item, count) in character.needed_items() {
                let _ = writeln!(out, "    {}: {}", item, count);
            }
        }
        if !character.needed_skills().is_empty() {
            out.push_str("  skill points:\n");
            for (skill, count) in character.needed_skills() {
                let _ = writeln!(out, "    {}: {}", skill, count);
            }
        }
        Ok(out)
    }

    fn list(&self, caller: &str) -> Result<String, CommandError> {
        let names = self
            .read(caller)?
            .map(|user| user.character_names())
            .unwrap_or_default();

        if names.is_empty() {
            return Ok("no characters".to_string());
        }

        let mut out = String::from("characters:\n");
        for name in names {
            let _ = writeln!(out, "  {}", name);
        }
        Ok(out)
    }

    fn writable(&self) -> Result<TxGuard<'_>, CommandError> {
        begin(self.api.as_ref(), true)
            .map_err(|e| CommandError::persistence("could not start transaction", e))
    }

    /// Reads the caller, `None` if they never used the bot.
    fn read(&self, caller: &str) -> Result<Option<User>, CommandError> {
        let tx = begin(self.api.as_ref(), false)
            .map_err(|e| CommandError::persistence("could not start transaction", e))?;

        match tx.get_user(caller) {
            Ok(user) => Ok(Some(user)),
            Err(StorageError::UserNotFound(_)) => Ok(None),
            Err(e) => Err(CommandError::persistence("could not load user", e)),
        }
    }
}

fn character_name(args: &str) -> Result<&str, CommandError> {
    let name = args.trim();
    if name.is_empty() {
        return Err(CommandError::NameRequired("character"));
    }
    if name.contains(char::is_whitespace) {
        return Err(CommandError::InvalidName(name.to_string()));
    }
    Ok(name)
}

fn load_or_create(tx: &mut TxGuard<'_>, caller: &str) -> Result<User, CommandError> {
    match tx.get_user(caller) {
        Ok(user) => Ok(user),
        Err(StorageError::UserNotFound(_)) => tx
            .add_user(caller)
            .map_err(|e| CommandError::persistence("could not create user", e)),
        Err(e) => Err(CommandError::persistence("could not load user", e)),
    }
}

fn save(mut tx: TxGuard<'_>, user: &User, context: &'static str) -> Result<(), CommandError> {
    tx.save_user(user)
        .map_err(|e| CommandError::persistence(context, e))?;
    tx.commit()
        .map_err(|e| CommandError::persistence(context, e))
}

/// Builds the dispatcher for `<pre_command> create|delete|show|list ...`.
pub fn char_command_handler(api: Arc<dyn UserApi>, pre_command: &str) -> CommandHandler<'static> {
    let options = CommandHandlerOptions::new(pre_command, "subcommand");
    let cc = CharCommands { api };

    let known = SUBCOMMANDS.iter().copied().chain(["", "help"]);
    let mut ch = CommandHandler::new(Parser::new(ParserOptions::new(' ', known)), options.clone());

    let help = Arc::new(line_handler_fn(move |_: &str, _: &str| {
        Ok(usage_text(&options, " [name]", SUBCOMMANDS))
    }));
    ch.set_handler("", Arc::clone(&help));
    ch.set_handler("help", help);

    let c = cc.clone();
    ch.set_handler("create", line_handler_fn(move |caller: &str, args: &str| c.create(caller, args)));
    let c = cc.clone();
    ch.set_handler("delete", line_handler_fn(move |caller: &str, args: &str| c.delete(caller, args)));
    let c = cc.clone();
    ch.set_handler("show", line_handler_fn(move |caller: &str, args: &str| c.show(caller, args)));
    ch.set_handler("list", line_handler_fn(move |caller: &str, _: &str| cc.list(caller)));

    ch
}
