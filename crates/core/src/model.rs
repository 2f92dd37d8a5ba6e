//! Enumerations shared by every layer: task lifecycle, project roles,
//! invite and activity kinds.
//!
//! All of them serialize as `snake_case` strings, which is also the form
//! stored in the database.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("unknown {kind}: {value}")]
    Unknown { kind: &'static str, value: String },
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ModelError::Unknown {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Lifecycle of a task. Declaration order is the Kanban column order.
    TaskStatus as "task status" {
        Todo => "todo",
        InProgress => "in_progress",
        Review => "review",
        Done => "done",
    }
}

impl TaskStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Done)
    }

    /// Human label used in chat replies and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Todo => "to do",
            Self::InProgress => "in progress",
            Self::Review => "in review",
            Self::Done => "done",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

string_enum! {
    /// Task urgency, ordered from least to most urgent.
    TaskPriority as "task priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl TaskPriority {
    fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl PartialOrd for TaskPriority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskPriority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

string_enum! {
    ProjectStatus as "project status" {
        Active => "active",
        OnHold => "on_hold",
        Completed => "completed",
        Archived => "archived",
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Active
    }
}

string_enum! {
    /// Membership role within a project.
    ProjectRole as "project role" {
        Owner => "owner",
        Admin => "admin",
        Member => "member",
        Viewer => "viewer",
    }
}

impl ProjectRole {
    /// May create and modify tasks, comments and documents.
    pub fn can_edit(&self) -> bool {
        !matches!(self, Self::Viewer)
    }

    /// May change the project itself, its members and its invites.
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

string_enum! {
    InviteStatus as "invite status" {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
        Revoked => "revoked",
    }
}

string_enum! {
    /// Kind of row in the activity feed. `Comment` rows double as task comments.
    ActivityAction as "activity action" {
        ProjectCreated => "project_created",
        ProjectUpdated => "project_updated",
        TaskCreated => "task_created",
        TaskUpdated => "task_updated",
        TaskStatusChanged => "task_status_changed",
        TaskDeleted => "task_deleted",
        MemberJoined => "member_joined",
        MemberRemoved => "member_removed",
        MemberRoleChanged => "member_role_changed",
        InviteSent => "invite_sent",
        InviteRevoked => "invite_revoked",
        DocumentUploaded => "document_uploaded",
        DocumentDeleted => "document_deleted",
        Comment => "comment",
    }
}

/// Parse a `YYYY-MM-DD` due date.
pub fn parse_due_date(s: &str) -> Result<NaiveDate, ModelError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ModelError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), *status);
        }
        assert!("blocked".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde_matches_as_str() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: TaskStatus = serde_json::from_str("\"review\"").unwrap();
        assert_eq!(back, TaskStatus::Review);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn test_role_capabilities() {
        assert!(ProjectRole::Owner.can_manage());
        assert!(ProjectRole::Admin.can_manage());
        assert!(!ProjectRole::Member.can_manage());
        assert!(ProjectRole::Member.can_edit());
        assert!(!ProjectRole::Viewer.can_edit());
        assert!(ProjectRole::Owner.is_owner());
        assert!(!ProjectRole::Admin.is_owner());
    }

    #[test]
    fn test_unknown_value_error_names_kind() {
        let err = "boss".parse::<ProjectRole>().unwrap_err();
        assert_eq!(err.to_string(), "unknown project role: boss");
    }

    #[test]
    fn test_parse_due_date() {
        assert_eq!(
            parse_due_date("2026-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert!(parse_due_date("03/01/2026").is_err());
        assert!(parse_due_date("").is_err());
    }
}
