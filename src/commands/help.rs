//! Usage and help text.

use crate::commands::handler::CommandHandlerOptions;
use std::fmt::Write;

/// Builds the help text shown for an empty command at some level.
///
/// ```text
/// Usage: <usage><args>
///
/// Available <placeholder>s:
///   <entry>
/// ```
pub fn usage_text<I, S>(options: &CommandHandlerOptions, args: &str, entries: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut help = format!("Usage: {}{}\n\n", options.usage(), args);
    let _ = writeln!(help, "Available {}s:", options.placeholder);
    for entry in entries {
        let _ = writeln!(help, "  {}", entry.as_ref());
    }
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_text_layout() {
        let options = CommandHandlerOptions::new("!need item", "charname");
        assert_eq!(
            usage_text(&options, " [item name] [count?]", ["Alf", "Bob"]),
            "Usage: !need item [charname] [item name] [count?]\n\nAvailable charnames:\n  Alf\n  Bob\n"
        );
    }

    #[test]
    fn test_usage_text_without_entries() {
        let options = CommandHandlerOptions::new("!need pts", "charname");
        assert_eq!(
            usage_text(&options, "", Vec::<String>::new()),
            "Usage: !need pts [charname]\n\nAvailable charnames:\n"
        );
    }
}
