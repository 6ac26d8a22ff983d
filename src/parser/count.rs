//! Trailing Count Extraction
//!
//! Leaf commands accept an optional count after a free-text name:
//!
//! ```text
//! "Lightning Staff 3"   ->  ("Lightning Staff", "3")
//! "Lightning Staff"     ->  ("Lightning Staff", "")
//! "3"                   ->  ("", "3")
//! ```
//!
//! Only a whitespace-delimited run of ASCII digits counts. `"sword5"` is a
//! name, and `"sword -5"` keeps the `-5` as part of the name. Interpreting the
//! digits (defaulting, overflow, sign checks) is left to the caller.

/// Splits a trailing run of digits from the rest of the input.
///
/// Returns the prefix with surrounding whitespace removed and embedded
/// whitespace runs collapsed to single spaces, and the digit suffix (empty
/// when there is none).
pub fn maybe_count(input: &str) -> (String, &str) {
    let trimmed = input.trim_end();

    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let (prefix, count) = match digits_start {
        Some(start) if starts_at_boundary(trimmed, start) => (&trimmed[..start], &trimmed[start..]),
        _ => (trimmed, ""),
    };

    (collapse_whitespace(prefix), count)
}

/// True if the digit run starting at `start` is preceded by whitespace or
/// begins the input.
fn starts_at_boundary(input: &str, start: usize) -> bool {
    input[..start]
        .chars()
        .next_back()
        .is_none_or(char::is_whitespace)
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_count() {
        assert_eq!(maybe_count("sword 5"), ("sword".to_string(), "5"));
    }

    #[test]
    fn test_name_without_count() {
        assert_eq!(maybe_count("sword"), ("sword".to_string(), ""));
    }

    #[test]
    fn test_count_only() {
        assert_eq!(maybe_count("5"), (String::new(), "5"));
        assert_eq!(maybe_count("  42  "), (String::new(), "42"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(maybe_count(""), (String::new(), ""));
        assert_eq!(maybe_count("   "), (String::new(), ""));
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(
            maybe_count("  iron   sword \t 12 "),
            ("iron sword".to_string(), "12")
        );
    }

    #[test]
    fn test_digits_glued_to_name_are_not_a_count() {
        assert_eq!(maybe_count("sword5"), ("sword5".to_string(), ""));
        assert_eq!(maybe_count("T3 armor"), ("T3 armor".to_string(), ""));
    }

    #[test]
    fn test_only_last_run_is_the_count() {
        assert_eq!(maybe_count("rank 2 ring 10"), ("rank 2 ring".to_string(), "10"));
    }

    #[test]
    fn test_signed_suffix_stays_in_name() {
        assert_eq!(maybe_count("sword -5"), ("sword -5".to_string(), ""));
        assert_eq!(maybe_count("sword +5"), ("sword +5".to_string(), ""));
    }

    #[test]
    fn test_oversized_count_is_still_extracted() {
        let (name, count) = maybe_count("sword 99999999999999999999999");
        assert_eq!(name, "sword");
        assert_eq!(count, "99999999999999999999999");
    }
}
