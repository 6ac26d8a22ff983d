//! The `need` Command Family
//!
//! Lets a user record what their characters still need:
//!
//! ```text
//! !need item <charname> <item name> [count]
//! !need pts  <charname> <skill name> [count]
//! ```
//!
//! The character level is a dispatcher built per invocation. Its whitelist is
//! the caller's current character names, fetched inside the same
//! transaction that later saves the result, so routing and persistence see
//! the same user.
//!
//! ## Leaf Protocol
//!
//! Both leaves run the same steps in the same order so that error precedence
//! never depends on which leaf handled the line:
//!
//! 1. split off the count suffix (default 1)
//! 2. require a non-empty name
//! 3. interpret the count
//! 4. resolve the character
//! 5. increment the counter
//! 6. confirm the delta

use crate::commands::error::{parse_count, CommandError};
use crate::commands::handler::{line_handler_fn, CommandHandler, CommandHandlerOptions, LineHandler};
use crate::commands::help::usage_text;
use crate::parser::{maybe_count, Parser, ParserOptions};
use crate::storage::{begin, Character, StorageError, User, UserApi};
use std::iter;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Which counter a need leaf increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedKind {
    /// `need item`: needed item counts
    Item,
    /// `need pts`: needed skill points
    Points,
}

impl NeedKind {
    /// Token that selects this kind below `need`.
    pub fn token(self) -> &'static str {
        match self {
            NeedKind::Item => "item",
            NeedKind::Points => "pts",
        }
    }

    /// What the free-text name refers to.
    fn subject(self) -> &'static str {
        match self {
            NeedKind::Item => "item",
            NeedKind::Points => "skill",
        }
    }

    fn apply(self, character: &mut Character, name: &str, delta: u64) -> u64 {
        match self {
            NeedKind::Item => character.incr_needed_item(name, delta),
            NeedKind::Points => character.incr_needed_skill(name, delta),
        }
    }

    fn confirmation(self, char_name: &str, delta: u64, name: &str) -> String {
        match self {
            NeedKind::Item => format!("marked {} as needing +{} of {}", char_name, delta, name),
            NeedKind::Points => {
                format!("marked {} as needing +{} points in {}", char_name, delta, name)
            }
        }
    }

    fn save_context(self) -> &'static str {
        match self {
            NeedKind::Item => "could not save item need",
            NeedKind::Points => "could not save points need",
        }
    }
}

/// Leaf bound to one character of the caller.
struct NeedHandler<'a> {
    user: &'a Mutex<User>,
    char_name: String,
    kind: NeedKind,
}

impl LineHandler for NeedHandler<'_> {
    fn handle_line(&self, _caller: &str, args: &str) -> Result<String, CommandError> {
        let (name, count) = maybe_count(args);

        if name.is_empty() {
            return Err(CommandError::NameRequired(self.kind.subject()));
        }

        let delta = parse_count(count)?;

        let mut user = self.user.lock().map_err(|_| {
            CommandError::persistence(
                "could not access user",
                StorageError::Unavailable("user lock poisoned".to_string()),
            )
        })?;

        let character = user
            .character_mut(&self.char_name)
            .map_err(|_| CommandError::CharacterNotFound(self.char_name.clone()))?;

        let total = self.kind.apply(character, &name, delta);
        debug!(
            character = %self.char_name,
            name = %name,
            delta,
            total,
            kind = self.kind.token(),
            "Need incremented"
        );

        Ok(self.kind.confirmation(&self.char_name, delta, &name))
    }
}

/// Shared state of the `need` family.
#[derive(Clone)]
struct NeedCommands {
    pre_command: String,
    api: Arc<dyn UserApi>,
}

impl NeedCommands {
    fn options(&self, kind: NeedKind) -> CommandHandlerOptions {
        CommandHandlerOptions::new(format!("{} {}", self.pre_command, kind.token()), "charname")
    }

    /// Help for the character level. Never fails: storage errors drop the
    /// character listing and keep the usage line.
    fn character_help(&self, kind: NeedKind, caller: &str) -> String {
        let options = self.options(kind);
        let args = format!(" [{} name] [count?]", kind.subject());

        match self.character_names(caller) {
            Ok(names) => usage_text(&options, &args, names),
            Err(e) => {
                debug!(caller = caller, error = %e, "Character listing unavailable for help");
                usage_text(&options, &args, iter::empty::<&str>())
            }
        }
    }

    fn character_names(&self, caller: &str) -> Result<Vec<String>, StorageError> {
        let tx = begin(self.api.as_ref(), false)?;
        Ok(tx.get_user(caller)?.character_names())
    }

    /// Runs `args` through a dispatcher keyed by the caller's characters and
    /// persists the result.
    fn dispatch(&self, kind: NeedKind, caller: &str, args: &str) -> Result<String, CommandError> {
        let mut tx = begin(self.api.as_ref(), true)
            .map_err(|e| CommandError::persistence("could not start transaction", e))?;

        let user = match tx.get_user(caller) {
            Ok(user) => user,
            Err(StorageError::UserNotFound(_)) => tx
                .add_user(caller)
                .map_err(|e| CommandError::persistence("could not create user", e))?,
            Err(e) => return Err(CommandError::persistence("could not load user", e)),
        };

        let names = user.character_names();
        let user = Mutex::new(user);

        let reply = {
            let known = names.iter().cloned().chain(iter::once(String::new()));
            let mut ch = CommandHandler::new(
                Parser::new(ParserOptions::new(' ', known)),
                self.options(kind),
            );

            let help = self.clone();
            ch.set_handler(
                "",
                line_handler_fn(move |caller: &str, _: &str| Ok(help.character_help(kind, caller))),
            );
            for name in &names {
                ch.set_handler(
                    name.clone(),
                    NeedHandler {
                        user: &user,
                        char_name: name.clone(),
                        kind,
                    },
                );
            }

            ch.handle_line(caller, args)?
        };

        let user = user.into_inner().map_err(|_| {
            CommandError::persistence(
                kind.save_context(),
                StorageError::Unavailable("user lock poisoned".to_string()),
            )
        })?;

        tx.save_user(&user)
            .map_err(|e| CommandError::persistence(kind.save_context(), e))?;
        tx.commit()
            .map_err(|e| CommandError::persistence(kind.save_context(), e))?;

        info!(caller = caller, kind = kind.token(), "Need recorded");
        Ok(reply)
    }
}

/// Builds the dispatcher for `<pre_command> item|pts ...`.
pub fn need_command_handler(api: Arc<dyn UserApi>, pre_command: &str) -> CommandHandler<'static> {
    let options = CommandHandlerOptions::new(pre_command, "type");
    let nc = NeedCommands {
        pre_command: pre_command.to_string(),
        api,
    };

    let mut ch = CommandHandler::new(
        Parser::new(ParserOptions::new(' ', ["", "help", "pts", "item"])),
        options.clone(),
    );

    let family_help = Arc::new(line_handler_fn(move |_: &str, _: &str| {
        Ok(usage_text(
            &options,
            " [charname] [name] [count?]",
            [NeedKind::Item.token(), NeedKind::Points.token()],
        ))
    }));
    ch.set_handler("", Arc::clone(&family_help));
    ch.set_handler("help", family_help);

    for kind in [NeedKind::Item, NeedKind::Points] {
        let nc = nc.clone();
        ch.set_handler(
            kind.token(),
            line_handler_fn(move |caller: &str, args: &str| nc.dispatch(kind, caller, args)),
        );
    }

    ch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, Transaction};

    fn store_with(characters: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        {
            let mut tx = begin(store.as_ref(), true).unwrap();
            let mut user = tx.add_user("alice").unwrap();
            for name in characters {
                user.add_character(name).unwrap();
            }
            tx.save_user(&user).unwrap();
            tx.commit().unwrap();
        }
        store
    }

    fn need(store: &Arc<MemoryStore>) -> CommandHandler<'static> {
        need_command_handler(store.clone(), "!need")
    }

    fn item_count(store: &MemoryStore, character: &str, item: &str) -> Option<u64> {
        let user = store.user("alice").unwrap()?;
        user.character(character)?.needed_items().get(item).copied()
    }

    /// Storage that fails every call.
    struct BrokenApi;

    impl UserApi for BrokenApi {
        fn new_transaction(
            &self,
            _writable: bool,
        ) -> Result<Box<dyn Transaction + '_>, StorageError> {
            Err(StorageError::Unavailable("database offline".to_string()))
        }
    }

    /// Storage whose read-only transactions fail.
    struct NoReadsApi(MemoryStore);

    impl UserApi for NoReadsApi {
        fn new_transaction(
            &self,
            writable: bool,
        ) -> Result<Box<dyn Transaction + '_>, StorageError> {
            if !writable {
                return Err(StorageError::Unavailable("replica offline".to_string()));
            }
            self.0.new_transaction(writable)
        }
    }

    #[test]
    fn test_item_need_with_count() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);

        assert_eq!(
            ch.handle_line("alice", "item Bob sword 3"),
            Ok("marked Bob as needing +3 of sword".to_string())
        );
        assert_eq!(item_count(&store, "Bob", "sword"), Some(3));
    }

    #[test]
    fn test_item_need_defaults_to_one() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);

        assert_eq!(
            ch.handle_line("alice", "item Bob sword"),
            Ok("marked Bob as needing +1 of sword".to_string())
        );
        assert_eq!(item_count(&store, "Bob", "sword"), Some(1));
    }

    #[test]
    fn test_needs_accumulate() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);

        ch.handle_line("alice", "item Bob sword 3").unwrap();
        ch.handle_line("alice", "item Bob sword 4").unwrap();

        assert_eq!(item_count(&store, "Bob", "sword"), Some(7));
    }

    #[test]
    fn test_points_need() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);

        assert_eq!(
            ch.handle_line("alice", "pts Bob Destruction   Staff 2"),
            Ok("marked Bob as needing +2 points in Destruction Staff".to_string())
        );
        let user = store.user("alice").unwrap().unwrap();
        assert_eq!(
            user.character("Bob").unwrap().needed_skills().get("Destruction Staff"),
            Some(&2)
        );
    }

    #[test]
    fn test_unknown_character() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);

        assert_eq!(
            ch.handle_line("alice", "item Unknown sword 1"),
            Err(CommandError::UnknownCommand {
                token: "Unknown".to_string(),
                usage: "!need item [charname]".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_type() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);

        assert!(matches!(
            ch.handle_line("alice", "gold Bob 5"),
            Err(CommandError::UnknownCommand { ref token, .. }) if token == "gold"
        ));
    }

    #[test]
    fn test_error_precedence() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);

        assert_eq!(
            ch.handle_line("alice", "item Bob 5"),
            Err(CommandError::NameRequired("item"))
        );
        assert_eq!(
            ch.handle_line("alice", "pts Bob"),
            Err(CommandError::NameRequired("skill"))
        );
        assert!(matches!(
            ch.handle_line("alice", "item Bob sword 99999999999999999999999"),
            Err(CommandError::InvalidCount { .. })
        ));
    }

    #[test]
    fn test_failures_never_save() {
        let store = store_with(&["Bob"]);
        let ch = need(&store);
        let before = store.stats();

        for line in [
            "item Bob 5",
            "item Bob sword 99999999999999999999999",
            "item Nobody sword 1",
            "pts Bob",
        ] {
            assert!(ch.handle_line("alice", line).is_err(), "{line}");
        }

        let after = store.stats();
        assert_eq!(after.saves, before.saves);
        assert_eq!(after.commits, before.commits);
        assert_eq!(after.rollbacks, before.rollbacks + 4);
        assert_eq!(item_count(&store, "Bob", "sword"), None);
    }

    #[test]
    fn test_character_help_lists_names() {
        let store = store_with(&["Bob", "Alf"]);
        let ch = need(&store);

        assert_eq!(
            ch.handle_line("alice", "item").unwrap(),
            "Usage: !need item [charname] [item name] [count?]\n\nAvailable charnames:\n  Alf\n  Bob\n"
        );
        assert_eq!(
            ch.handle_line("alice", "pts   ").unwrap(),
            "Usage: !need pts [charname] [skill name] [count?]\n\nAvailable charnames:\n  Alf\n  Bob\n"
        );
    }

    #[test]
    fn test_first_use_creates_user() {
        let store = Arc::new(MemoryStore::new());
        let ch = need(&store);

        assert_eq!(
            ch.handle_line("carol", "item").unwrap(),
            "Usage: !need item [charname] [item name] [count?]\n\nAvailable charnames:\n"
        );
        assert!(store.user("carol").unwrap().is_some());
    }

    #[test]
    fn test_help_survives_storage_failure() {
        let ch = need_command_handler(Arc::new(BrokenApi), "!need");
        let nc = NeedCommands {
            pre_command: "!need".to_string(),
            api: Arc::new(BrokenApi),
        };

        assert_eq!(
            nc.character_help(NeedKind::Item, "alice"),
            "Usage: !need item [charname] [item name] [count?]\n\nAvailable charnames:\n"
        );
        assert!(ch.handle_line("alice", "").is_ok());
        assert!(ch.handle_line("alice", "help").is_ok());
    }

    #[test]
    fn test_character_help_degrades_inside_dispatch() {
        let ch = need_command_handler(Arc::new(NoReadsApi(MemoryStore::new())), "!need");

        assert_eq!(
            ch.handle_line("alice", "pts"),
            Ok("Usage: !need pts [charname] [skill name] [count?]\n\nAvailable charnames:\n".to_string())
        );
    }

    #[test]
    fn test_storage_failure_is_internal() {
        let ch = need_command_handler(Arc::new(BrokenApi), "!need");

        let err = ch.handle_line("alice", "item Bob sword 3").unwrap_err();
        assert!(err.is_internal());
        assert!(matches!(err, CommandError::Persistence { .. }));
    }

    #[test]
    fn test_family_help() {
        let store = store_with(&[]);
        let ch = need(&store);

        let help = ch.handle_line("alice", "").unwrap();
        assert_eq!(help, ch.handle_line("alice", "help").unwrap());
        assert_eq!(
            help,
            "Usage: !need [type] [charname] [name] [count?]\n\nAvailable types:\n  item\n  pts\n"
        );
    }
}
