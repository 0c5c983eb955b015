use reflex_core::UsernameValidator;

/// Substrings that may not appear in a display name, compared lowercase.
pub const DEFAULT_BANNED_WORDS: &[&str] = &[
    "fuck", "shit", "sex", "pussy", "섹스", "보지", "자지", "느금마", "니미럴", "애미", "애비",
    "앰생", "살인", "자살", "운지", "일베", "일간베스트", "ilbe", "메갈", "한남", "한녀",
];

/// Rejects names containing any banned substring, case-insensitively
#[derive(Debug, Clone)]
pub struct BannedWords {
    words: Vec<String>,
}

impl BannedWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// The default list plus `extra`.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        list.words.extend(
            extra
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty()),
        );
        list
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for BannedWords {
    fn default() -> Self {
        Self::new(DEFAULT_BANNED_WORDS)
    }
}

impl UsernameValidator for BannedWords {
    fn is_allowed(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        !self.words.iter().any(|w| name.contains(w.as_str()))
    }
}
