use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{Alphabetic}\p{N}]+").expect("word pattern compiles"));

/// Lowercased alphanumeric words longer than two characters.
pub fn tokenize_text(text: &str) -> HashSet<String> {
    words(text).collect()
}

/// Query terms in order of appearance, without repeats.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(query).filter(|word| seen.insert(word.clone())).collect()
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    WORD.find_iter(text)
        .map(|m| m.as_str())
        .filter(|word| word.chars().count() > 2)
        .map(|word| word.to_lowercase())
}
