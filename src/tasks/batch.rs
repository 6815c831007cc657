//! Batch report input.
//!
//! A batch report is a JSON array of items sent by an agent about one task. Each item
//! may carry any of these parts, applied in this order:
//!
//! ```json
//! [
//!   {"comment": "Started on the parser", "author": "sub-agent"},
//!   {"todo_id": 12, "status": "done"},
//!   {"phase_id": 4, "status": "in_progress"},
//!   {"task_status": "done"}
//! ]
//! ```
//!
//! `author` defaults to `sub-agent`. An object of the form `{"items": [...]}` is
//! accepted as well.

use crate::error::{Error, Result};
use crate::tasks::models::{Author, PhaseStatus, Task, TaskStatus, TodoStatus};
use serde::{Deserialize, Serialize};

/// One raw batch item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Free-text comment to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Author of the comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Todo to update with `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo_id: Option<i64>,
    /// Phase to update with `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<i64>,
    /// New status for `todo_id` or `phase_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Forced task status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<String>,
}

/// A validated part of a batch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAction {
    /// Append a comment.
    Comment {
        /// Comment text.
        text: String,
        /// Who wrote it.
        author: Author,
    },
    /// Set a todo's status.
    Todo {
        /// Todo id.
        id: i64,
        /// New status.
        status: TodoStatus,
    },
    /// Set a phase's status.
    Phase {
        /// Phase id.
        id: i64,
        /// New status.
        status: PhaseStatus,
    },
    /// Set the task's status without the completion guard.
    TaskStatus(TaskStatus),
}

impl BatchItem {
    /// Validate the item and split it into actions, in application order.
    ///
    /// `index` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty item or an id without a status, and
    /// an invalid-value error for unknown status or author strings.
    pub fn actions(&self, index: usize) -> Result<Vec<BatchAction>> {
        let mut actions = Vec::new();

        if let Some(text) = &self.comment {
            let author = match &self.author {
                Some(a) => a.parse()?,
                None => Author::SubAgent,
            };
            actions.push(BatchAction::Comment { text: text.clone(), author });
        }

        if let Some(id) = self.todo_id {
            let status = self.required_status(index, "todo_id")?.parse()?;
            actions.push(BatchAction::Todo { id, status });
        }

        if let Some(id) = self.phase_id {
            let status = self.required_status(index, "phase_id")?.parse()?;
            actions.push(BatchAction::Phase { id, status });
        }

        if let Some(status) = &self.task_status {
            actions.push(BatchAction::TaskStatus(status.parse()?));
        }

        if actions.is_empty() {
            return Err(Error::Validation(format!("Batch item {index} has nothing to apply")));
        }

        Ok(actions)
    }

    fn required_status(&self, index: usize, field: &str) -> Result<&str> {
        self.status.as_deref().ok_or_else(|| {
            Error::Validation(format!("Batch item {index}: {field} requires a status"))
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchInput {
    Items(Vec<BatchItem>),
    Wrapped { items: Vec<BatchItem> },
}

/// Parse a batch report from JSON.
///
/// # Errors
///
/// Returns an error if the JSON is not an item array or an `{"items": [...]}` object.
pub fn parse_items(json: &str) -> Result<Vec<BatchItem>> {
    let input: BatchInput = serde_json::from_str(json)?;
    Ok(match input {
        BatchInput::Items(items) | BatchInput::Wrapped { items } => items,
    })
}

/// Validate every item up front.
///
/// # Errors
///
/// Returns the first item's validation error.
pub fn plan(items: &[BatchItem]) -> Result<Vec<BatchAction>> {
    let mut actions = Vec::new();
    for (index, item) in items.iter().enumerate() {
        actions.extend(item.actions(index)?);
    }
    Ok(actions)
}

/// Summary of an applied batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// The task after the trailing recompute.
    pub task: Task,
    /// Comments appended from items.
    pub comments_added: usize,
    /// Todo status writes.
    pub todos_updated: usize,
    /// Phase status writes.
    pub phases_updated: usize,
    /// Whether a forced task status was applied.
    pub task_status_set: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_and_wrapped() {
        let items = parse_items(r#"[{"comment": "hi"}, {"todo_id": 3, "status": "done"}]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].todo_id, Some(3));

        let wrapped = parse_items(r#"{"items": [{"task_status": "done"}]}"#).unwrap();
        assert_eq!(wrapped[0].task_status.as_deref(), Some("done"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_items(r#"{"comment": "not a list"}"#).is_err());
        assert!(parse_items("nope").is_err());
    }

    #[test]
    fn test_comment_defaults_to_sub_agent() {
        let item = BatchItem { comment: Some("note".to_string()), ..BatchItem::default() };
        assert_eq!(
            item.actions(0).unwrap(),
            vec![BatchAction::Comment { text: "note".to_string(), author: Author::SubAgent }]
        );
    }

    #[test]
    fn test_parts_apply_in_fixed_order() {
        let item: BatchItem = serde_json::from_str(
            r#"{"task_status": "done", "todo_id": 1, "status": "done", "comment": "all", "author": "agent"}"#,
        )
        .unwrap();
        let actions = item.actions(0).unwrap();
        assert_eq!(
            actions,
            vec![
                BatchAction::Comment { text: "all".to_string(), author: Author::Agent },
                BatchAction::Todo { id: 1, status: TodoStatus::Done },
                BatchAction::TaskStatus(TaskStatus::Done),
            ]
        );
    }

    #[test]
    fn test_status_parsed_per_target() {
        let phase = BatchItem {
            phase_id: Some(2),
            status: Some("blocked".to_string()),
            ..BatchItem::default()
        };
        assert_eq!(
            phase.actions(0).unwrap(),
            vec![BatchAction::Phase { id: 2, status: PhaseStatus::Blocked }]
        );

        let todo =
            BatchItem { todo_id: Some(2), status: Some("blocked".to_string()), ..BatchItem::default() };
        assert!(matches!(todo.actions(0), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn test_validation_errors() {
        let missing = BatchItem { todo_id: Some(9), ..BatchItem::default() };
        let err = missing.actions(4).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Batch item 4: todo_id requires a status");

        let empty = BatchItem::default();
        assert!(matches!(empty.actions(0), Err(Error::Validation(_))));
    }

    #[test]
    fn test_plan_stops_at_first_bad_item() {
        let items = vec![
            BatchItem { comment: Some("ok".to_string()), ..BatchItem::default() },
            BatchItem { author: Some("robot".to_string()), comment: Some("x".to_string()), ..BatchItem::default() },
        ];
        assert!(matches!(plan(&items), Err(Error::InvalidValue(_))));
        assert_eq!(plan(&items[..1]).unwrap().len(), 1);
    }
}
