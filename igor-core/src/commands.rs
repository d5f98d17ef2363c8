// ABOUTME: Wake-word and command prefix matching shared by channels and reactors
// ABOUTME: Case-insensitive, whitespace-tolerant, word-boundary aware

/// Wake-word used when configuration does not set one.
pub const DEFAULT_WAKE_WORD: &str = "igor";

/// Match `words` as leading whitespace-separated tokens of `text`, ignoring case.
/// Returns the trimmed remainder after the last matched token.
fn strip_words<'a, 'w>(text: &'a str, words: impl IntoIterator<Item = &'w str>) -> Option<&'a str> {
    let mut rest = text.trim_start();
    let mut matched_any = false;

    for word in words {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        if token.is_empty() || token.to_lowercase() != word.to_lowercase() {
            return None;
        }
        matched_any = true;
        rest = tail.trim_start();
    }

    matched_any.then(|| rest.trim_end())
}

/// Whether `text` is addressed to the bot: its first word is the wake-word.
///
/// ```
/// use igor_core::commands::has_wake_word;
/// assert!(has_wake_word("IGOR fortune", "igor"));
/// assert!(!has_wake_word("igorious", "igor"));
/// ```
pub fn has_wake_word(text: &str, wake_word: &str) -> bool {
    strip_wake_word(text, wake_word).is_some()
}

/// Text following the wake-word, or `None` if the wake-word is absent.
pub fn strip_wake_word<'a>(text: &'a str, wake_word: &str) -> Option<&'a str> {
    strip_words(text, wake_word.split_whitespace())
}

/// Text following `<wake-word> <command>`, or `None` if the prefix does not match.
/// `command` may span several words (e.g. "cat pic").
pub fn strip_command<'a>(text: &'a str, wake_word: &str, command: &str) -> Option<&'a str> {
    strip_words(
        text,
        wake_word.split_whitespace().chain(command.split_whitespace()),
    )
}
