use serde::{Deserialize, Serialize};

/// One change event as reported by the monitor service.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl LogEntry {
    #[cfg(test)]
    pub fn new(timestamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: message.into(),
            level: None,
        }
    }

    pub fn category(&self) -> ChangeCategory {
        ChangeCategory::of_message(&self.message)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ChangeCategory {
    Added,
    Modified,
    Deleted,
    Renamed,
    Other,
}

// Checked in this order; the first keyword found wins.
const CATEGORY_KEYWORDS: [(ChangeCategory, &str); 4] = [
    (ChangeCategory::Added, "ADDED"),
    (ChangeCategory::Modified, "MODIFIED"),
    (ChangeCategory::Deleted, "DELETED"),
    (ChangeCategory::Renamed, "RENAMED"),
];

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 5] = [
        Self::Added,
        Self::Modified,
        Self::Deleted,
        Self::Renamed,
        Self::Other,
    ];

    pub fn of_message(message: &str) -> Self {
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keyword)| message.contains(keyword))
            .map(|(category, _)| *category)
            .unwrap_or(Self::Other)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
            Self::Other => "Other",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Added => 0,
            Self::Modified => 1,
            Self::Deleted => 2,
            Self::Renamed => 3,
            Self::Other => 4,
        }
    }

    pub fn color(self) -> DisplayColor {
        match self {
            Self::Added => DisplayColor::Green,
            Self::Modified => DisplayColor::Yellow,
            Self::Deleted => DisplayColor::Red,
            Self::Renamed => DisplayColor::Blue,
            Self::Other => DisplayColor::Neutral,
        }
    }
}

/// Presentation color keyed by category. Kept backend-agnostic; the UI maps it to terminal colors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisplayColor {
    Green,
    Yellow,
    Red,
    Blue,
    Neutral,
}
