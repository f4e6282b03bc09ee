use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a user within a study. The creator is always inserted as `Admin`
/// atomically with study creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(MemberRole::Admin),
            "member" => Ok(MemberRole::Member),
            _ => Err(()),
        }
    }
}

/// A comment hangs off exactly one parent. Modeling the pair of nullable
/// foreign keys as a tagged union makes the "both or neither" case
/// unrepresentable past the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentParent {
    Post(i64),
    Issue(i64),
}

impl CommentParent {
    /// Split into the `(post_id, issue_id)` column pair.
    pub fn column_pair(self) -> (Option<i64>, Option<i64>) {
        match self {
            CommentParent::Post(id) => (Some(id), None),
            CommentParent::Issue(id) => (None, Some(id)),
        }
    }

    /// Rebuild from the column pair; `None` when the row violates the XOR
    /// invariant.
    pub fn from_columns(post_id: Option<i64>, issue_id: Option<i64>) -> Option<Self> {
        match (post_id, issue_id) {
            (Some(id), None) => Some(CommentParent::Post(id)),
            (None, Some(id)) => Some(CommentParent::Issue(id)),
            _ => None,
        }
    }
}

/// Fixed tag set for notification rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewPost,
    NewIssue,
    PostComment,
    IssueComment,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::NewPost => "new_post",
            NotificationType::NewIssue => "new_issue",
            NotificationType::PostComment => "post_comment",
            NotificationType::IssueComment => "issue_comment",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_post" => Ok(NotificationType::NewPost),
            "new_issue" => Ok(NotificationType::NewIssue),
            "post_comment" => Ok(NotificationType::PostComment),
            "issue_comment" => Ok(NotificationType::IssueComment),
            _ => Err(()),
        }
    }
}
