//! Top-level command tree.

use crate::commands::character::char_command_handler;
use crate::commands::handler::{line_handler_fn, CommandHandler, CommandHandlerOptions};
use crate::commands::help::usage_text;
use crate::commands::need::need_command_handler;
use crate::parser::{Parser, ParserOptions};
use crate::storage::UserApi;
use std::sync::Arc;

/// Command families reachable from the root.
pub const FAMILIES: [&str; 2] = ["char", "need"];

/// Builds the root dispatcher for lines that already had `prefix` stripped.
///
/// `prefix` is only used to render usage text (`"!need item ..."`).
pub fn root_handler(api: Arc<dyn UserApi>, prefix: &str) -> CommandHandler<'static> {
    let options = CommandHandlerOptions::new(prefix, "command");
    let known = FAMILIES.iter().copied().chain(["", "help"]);
    let mut root = CommandHandler::new(Parser::new(ParserOptions::new(' ', known)), options.clone());

    let help = Arc::new(line_handler_fn(move |_: &str, _: &str| {
        Ok(usage_text(&options, " [args...]", FAMILIES))
    }));
    root.set_handler("", Arc::clone(&help));
    root.set_handler("help", help);

    root.set_handler(
        "need",
        need_command_handler(Arc::clone(&api), &format!("{}need", prefix)),
    );
    root.set_handler("char", char_command_handler(api, &format!("{}char", prefix)));

    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandError;
    use crate::storage::MemoryStore;

    #[test]
    fn test_full_tree() {
        let store = Arc::new(MemoryStore::new());
        let root = root_handler(store.clone(), "!");

        root.handle_line("alice", "char create Bob").unwrap();
        assert_eq!(
            root.handle_line("alice", "need item Bob sword 3"),
            Ok("marked Bob as needing +3 of sword".to_string())
        );
        assert_eq!(
            root.handle_line("alice", "need item Bob sword"),
            Ok("marked Bob as needing +1 of sword".to_string())
        );

        let user = store.user("alice").unwrap().unwrap();
        assert_eq!(
            user.character("Bob").unwrap().needed_items().get("sword"),
            Some(&4)
        );
    }

    #[test]
    fn test_root_help() {
        let root = root_handler(Arc::new(MemoryStore::new()), "!");
        assert_eq!(
            root.handle_line("alice", "help"),
            Ok("Usage: ![command] [args...]\n\nAvailable commands:\n  char\n  need\n".to_string())
        );
    }

    #[test]
    fn test_nested_usage_prefixes() {
        let root = root_handler(Arc::new(MemoryStore::new()), "!");

        assert_eq!(
            root.handle_line("alice", "dance"),
            Err(CommandError::UnknownCommand {
                token: "dance".to_string(),
                usage: "![command]".to_string(),
            })
        );
        assert_eq!(
            root.handle_line("alice", "need gold"),
            Err(CommandError::UnknownCommand {
                token: "gold".to_string(),
                usage: "!need [type]".to_string(),
            })
        );
        assert!(root
            .handle_line("alice", "need item")
            .unwrap()
            .starts_with("Usage: !need item [charname] [item name] [count?]"));
    }

    #[test]
    fn test_concurrent_needs_from_one_caller_all_apply() {
        use std::sync::Barrier;
        use std::thread;

        const THREADS: usize = 8;
        const ROUNDS: usize = 25;

        let store = Arc::new(MemoryStore::new());
        let root = Arc::new(root_handler(store.clone(), "!"));
        root.handle_line("alice", "char create Bob").unwrap();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let root = Arc::clone(&root);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for round in 0..ROUNDS {
                        let line = if t == 0 && round % 5 == 0 {
                            "need item"
                        } else {
                            "need item Bob sword 1"
                        };
                        root.handle_line("alice", line).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let expected = (THREADS * ROUNDS - ROUNDS / 5) as u64;
        let user = store.user("alice").unwrap().unwrap();
        assert_eq!(
            user.character("Bob").unwrap().needed_items().get("sword"),
            Some(&expected)
        );
        assert_eq!(store.stats().conflicts, 0);
    }
}
