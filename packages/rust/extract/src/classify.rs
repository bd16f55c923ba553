//! Open/closed classification of announcement text.

use std::sync::LazyLock;

use regex::Regex;

use skywatch_shared::{ExtractConfig, Result, SkywatchError, Status};

/// Restrictions introduced. A stem may be followed by up to 120 characters
/// within the same sentence before the next stem.
static BUILTIN_CLOSED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)временн\w[^.]{0,120}?ограничен\w[^.]{0,120}?введ\w+").unwrap()]
});

/// Restrictions lifted or arrivals resumed.
static BUILTIN_OPEN: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)ограничен\w[^.]{0,120}?снят\w+").unwrap(),
        Regex::new(r"(?i)снят\w[^.]{0,120}?ограничен\w+").unwrap(),
        Regex::new(r"(?i)возобновил\w[^.]{0,120}?при[её]м").unwrap(),
    ]
});

/// Classifies announcement text as an open or closed status change.
pub struct Classifier {
    closed: Vec<Regex>,
    open: Vec<Regex>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Classifier with only the built-in patterns.
    pub fn new() -> Self {
        Self {
            closed: BUILTIN_CLOSED.clone(),
            open: BUILTIN_OPEN.clone(),
        }
    }

    /// Classifier with user patterns appended after the built-ins.
    pub fn with_extra_patterns(config: &ExtractConfig) -> Result<Self> {
        let mut classifier = Self::new();

        for pattern in &config.closed_patterns {
            classifier.closed.push(compile(pattern)?);
        }
        for pattern in &config.open_patterns {
            classifier.open.push(compile(pattern)?);
        }

        Ok(classifier)
    }

    /// Classify a post. "Closed" wins when a post matches both directions,
    /// as restriction announcements sometimes quote the earlier lifting.
    pub fn classify(&self, text: &str) -> Option<Status> {
        if self.closed.iter().any(|re| re.is_match(text)) {
            return Some(Status::Closed);
        }
        if self.open.iter().any(|re| re.is_match(text)) {
            return Some(Status::Open);
        }
        None
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| SkywatchError::extract(format!("invalid pattern '{pattern}': {e}")))
}
