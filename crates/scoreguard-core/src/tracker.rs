//! Indexer classification against configured tracker name lists.

use serde::Serialize;

/// Source classification of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    /// Matches a configured private-tracker identifier.
    Private,
    /// Matches a configured public-tracker identifier.
    Public,
    /// Matches neither list, or no indexer was recorded.
    Unknown,
}

impl TrackerKind {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
            Self::Unknown => "unknown",
        }
    }
}

/// Case-insensitive substring matcher over private/public tracker identifiers.
#[derive(Debug, Clone, Default)]
pub struct TrackerClassifier {
    private: Vec<String>,
    public: Vec<String>,
}

impl TrackerClassifier {
    /// Build a classifier; identifiers are normalised to lowercase and blanks dropped.
    pub fn new<P, Q>(private: P, public: Q) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        Self {
            private: normalise(private),
            public: normalise(public),
        }
    }

    /// Classify an indexer name. The first list that matches wins, private first.
    #[must_use]
    pub fn classify(&self, indexer: &str) -> TrackerKind {
        let indexer = indexer.trim().to_lowercase();
        if indexer.is_empty() {
            return TrackerKind::Unknown;
        }
        if self.private.iter().any(|name| indexer.contains(name)) {
            TrackerKind::Private
        } else if self.public.iter().any(|name| indexer.contains(name)) {
            TrackerKind::Public
        } else {
            TrackerKind::Unknown
        }
    }

    /// Whether the indexer belongs to a private tracker.
    #[must_use]
    pub fn is_private(&self, indexer: &str) -> bool {
        self.classify(indexer) == TrackerKind::Private
    }
}

fn normalise<I>(names: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}
