// ── Phonebook lookup ──

use std::collections::HashMap;

/// Number → name resolution.
///
/// Lookups are synchronous and side-effect free; `None` means the number
/// is unknown and the emitter substitutes its unknown-caller label.
pub trait Phonebook: Send + Sync {
    fn lookup(&self, number: &str) -> Option<String>;
}

/// Phonebook that knows nobody.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyPhonebook;

impl Phonebook for EmptyPhonebook {
    fn lookup(&self, _number: &str) -> Option<String> {
        None
    }
}

/// In-memory phonebook, typically filled from the config file.
///
/// Numbers are compared after dropping spaces, dashes, slashes and
/// parentheses, so `"030 / 123-45"` matches `"03012345"`.
#[derive(Debug, Default, Clone)]
pub struct StaticPhonebook {
    entries: HashMap<String, String>,
}

impl StaticPhonebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, number: &str, name: impl Into<String>) {
        self.entries.insert(normalize(number), name.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for StaticPhonebook {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut book = Self::new();
        for (number, name) in iter {
            book.insert(number.as_ref(), name);
        }
        book
    }
}

impl Phonebook for StaticPhonebook {
    fn lookup(&self, number: &str) -> Option<String> {
        self.entries.get(&normalize(number)).cloned()
    }
}

fn normalize(number: &str) -> String {
    number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '/' | '(' | ')' | '\t'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_formatting() {
        let book: StaticPhonebook = [("030 / 123-45", "Oma"), ("+49 171 5550000", "Alex")]
            .into_iter()
            .collect();
        assert_eq!(book.len(), 2);
        assert_eq!(book.lookup("03012345").as_deref(), Some("Oma"));
        assert_eq!(book.lookup("+491715550000").as_deref(), Some("Alex"));
        assert_eq!(book.lookup("0301234"), None);
    }

    #[test]
    fn empty_phonebook_knows_nobody() {
        assert_eq!(EmptyPhonebook.lookup("110"), None);
    }
}
