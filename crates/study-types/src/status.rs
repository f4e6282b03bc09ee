use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an issue, derived from its date range.
///
/// The persisted `status` column is a cache written at create/update time;
/// every read path re-derives the value from the dates, so a stale column
/// never leaks to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueStatus {
    Scheduled,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

impl IssueStatus {
    /// Derive the status for `today` from an optional date range.
    ///
    /// The start-date check runs before the end-date check, so a malformed
    /// range with `end < start` still reports `Scheduled` while `today`
    /// precedes the start date.
    pub fn derive(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Self {
        if start.is_none() && end.is_none() {
            return IssueStatus::InProgress;
        }
        if let Some(start) = start {
            if today < start {
                return IssueStatus::Scheduled;
            }
        }
        if let Some(end) = end {
            if today > end {
                return IssueStatus::Closed;
            }
        }
        IssueStatus::InProgress
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Scheduled => "Scheduled",
            IssueStatus::InProgress => "In Progress",
            IssueStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(IssueStatus::Scheduled),
            "In Progress" => Ok(IssueStatus::InProgress),
            "Closed" => Ok(IssueStatus::Closed),
            _ => Err(()),
        }
    }
}
