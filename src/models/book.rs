use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Book`]. Transitions are monotonic except for an
/// explicit reset on retry (handled by the caller, not enforced here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Pending,
    Ingesting,
    Chunking,
    Completed,
    Extracting,
    Extracted,
    Partial,
    Embedded,
    Failed,
}

impl BookStatus {
    /// Ordering used to reject backwards transitions. Retry resets are the
    /// caller's responsibility and bypass this check entirely.
    pub fn rank(self) -> u8 {
        match self {
            BookStatus::Pending => 0,
            BookStatus::Ingesting => 1,
            BookStatus::Chunking => 2,
            BookStatus::Completed => 3,
            BookStatus::Extracting => 4,
            BookStatus::Extracted | BookStatus::Partial => 5,
            BookStatus::Embedded => 6,
            BookStatus::Failed => 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub order_in_series: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    pub genre: String,
    pub total_chapters: i64,
    pub status: BookStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookCreate {
    pub title: String,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub order_in_series: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    pub genre: String,
    pub total_chapters: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rank_is_monotonic_along_happy_path() {
        let happy_path = [
            BookStatus::Pending,
            BookStatus::Ingesting,
            BookStatus::Chunking,
            BookStatus::Completed,
            BookStatus::Extracting,
            BookStatus::Extracted,
            BookStatus::Embedded,
        ];
        for pair in happy_path.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }
}
