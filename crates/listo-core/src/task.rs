use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task text cannot be empty")]
    EmptyText,
}

/// Opaque task identifier.
///
/// Snapshots written by the mobile app store ids as strings, the web app as
/// numbers. Both read back as the same decimal string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawTaskId", into = "String")]
pub struct TaskId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTaskId {
    Text(String),
    Number(u64),
}

impl From<RawTaskId> for TaskId {
    fn from(raw: RawTaskId) -> Self {
        match raw {
            RawTaskId::Text(text) => Self(text),
            RawTaskId::Number(n) => Self(n.to_string()),
        }
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value when the id is timestamp-derived.
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task id cannot be empty")]
pub struct EmptyIdError;

impl FromStr for TaskId {
    type Err = EmptyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmptyIdError);
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Which delete semantics a store runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Deleted tasks stay in the list with `deleted = true` and can be restored.
    #[default]
    Soft,
    /// Deleted tasks are removed from the list.
    Hard,
}

impl DeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }

    /// Whether `task` belongs in the active view. The hard policy keeps no
    /// deleted partition, so a stray `deleted` flag is ignored there.
    pub fn is_active(self, task: &Task) -> bool {
        match self {
            Self::Soft => !task.is_deleted(),
            Self::Hard => true,
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid delete policy: {0} (expected soft or hard)")]
pub struct ParsePolicyError(String);

impl FromStr for DeletePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl Task {
    /// Builds a fresh task. `text` must already be normalized.
    pub fn new(id: TaskId, text: String, policy: DeletePolicy) -> Self {
        let deleted = match policy {
            DeletePolicy::Soft => Some(false),
            DeletePolicy::Hard => None,
        };
        Self {
            id,
            text,
            completed: false,
            deleted,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted == Some(true)
    }
}

pub fn normalize_text(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(trimmed.to_string())
}

pub fn share_message(prefix: &str, task: &Task) -> String {
    format!("{prefix}: {}", task.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_read_from_strings_and_numbers() {
        let mobile: Task =
            serde_json::from_str(r#"{"id":"1718000000000","text":"a","completed":false,"deleted":true}"#)
                .unwrap();
        let web: Task = serde_json::from_str(r#"{"id":1718000000000,"text":"a","completed":true}"#).unwrap();

        assert_eq!(mobile.id, web.id);
        assert!(mobile.is_deleted());
        assert_eq!(web.deleted, None);
        assert!(!web.is_deleted());
    }

    #[test]
    fn ids_always_write_as_strings() {
        let task = Task::new(TaskId::from(42), "x".to_string(), DeletePolicy::Soft);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], serde_json::json!("42"));
        assert_eq!(json["deleted"], serde_json::json!(false));
    }

    #[test]
    fn hard_policy_tasks_omit_deleted_field() {
        let task = Task::new(TaskId::from(1), "x".to_string(), DeletePolicy::Hard);
        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("deleted"));
    }

    #[test]
    fn missing_completed_defaults_to_false() {
        let task: Task = serde_json::from_str(r#"{"id":"7","text":"x"}"#).unwrap();
        assert!(!task.completed);
    }

    #[test]
    fn normalize_rejects_whitespace() {
        assert_eq!(normalize_text("   \t\n"), Err(ValidationError::EmptyText));
        assert_eq!(normalize_text(""), Err(ValidationError::EmptyText));
        assert_eq!(normalize_text("  Buy milk "), Ok("Buy milk".to_string()));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Hard".parse::<DeletePolicy>(), Ok(DeletePolicy::Hard));
        assert_eq!(" soft ".parse::<DeletePolicy>(), Ok(DeletePolicy::Soft));
        assert!("purge".parse::<DeletePolicy>().is_err());
    }

    #[test]
    fn task_id_parse_trims_and_rejects_empty() {
        assert_eq!("  12 ".parse::<TaskId>().unwrap().as_str(), "12");
        assert!("  ".parse::<TaskId>().is_err());
    }

    #[test]
    fn share_message_prefixes_text() {
        let task = Task::new(TaskId::from(1), "Buy milk".to_string(), DeletePolicy::Soft);
        assert_eq!(share_message("Mi Tarea", &task), "Mi Tarea: Buy milk");
    }
}
