//! Completion guard for direct task transitions to `done`.

use crate::tasks::models::TaskStatus;
use crate::tasks::progress::PhaseSnapshot;

/// A transition to `done` refused because checklist items are unfinished.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Cannot mark task as done: {incomplete} of {total} checklist items remain incomplete (phases: {})",
    .phases.join(", ")
)]
pub struct CompletionBlocked {
    /// Todos not yet done.
    pub incomplete: usize,
    /// All todos in the task.
    pub total: usize,
    /// Phases holding at least one unfinished todo, in attachment order.
    pub phases: Vec<String>,
}

/// Check that every todo in every phase is done.
///
/// Tasks without phases, and phases without todos, are vacuously complete.
///
/// # Errors
///
/// Returns [`CompletionBlocked`] naming the unfinished count and phases.
pub fn can_mark_done(phases: &[PhaseSnapshot]) -> Result<(), CompletionBlocked> {
    let mut incomplete = 0;
    let mut total = 0;
    let mut blocking = Vec::new();

    for phase in phases {
        let open = phase.todos.iter().filter(|t| !t.is_done()).count();
        total += phase.todos.len();
        if open > 0 {
            incomplete += open;
            blocking.push(phase.name.clone());
        }
    }

    if incomplete == 0 {
        Ok(())
    } else {
        Err(CompletionBlocked { incomplete, total, phases: blocking })
    }
}

/// Apply the guard to a requested status transition.
///
/// Only a move into `done` from another status is checked; re-affirming `done` and
/// every other target pass through.
///
/// # Errors
///
/// Returns [`CompletionBlocked`] when the target is `done` and items remain open.
pub fn guard_transition(
    current: TaskStatus,
    target: TaskStatus,
    phases: &[PhaseSnapshot],
) -> Result<(), CompletionBlocked> {
    if target == TaskStatus::Done && current != TaskStatus::Done {
        can_mark_done(phases)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::models::{PhaseStatus, TodoStatus};

    fn snapshot(name: &str, todos: &[TodoStatus]) -> PhaseSnapshot {
        PhaseSnapshot::new(name, PhaseStatus::InProgress, todos.to_vec())
    }

    #[test]
    fn test_blocks_with_detail() {
        let phases = vec![snapshot("Phase 1", &[TodoStatus::Done, TodoStatus::Todo])];
        let err = can_mark_done(&phases).unwrap_err();
        assert_eq!(err.incomplete, 1);
        assert_eq!(err.total, 2);
        assert!(err.to_string().contains("1 of 2 checklist items remain incomplete"));
        assert!(err.to_string().ends_with("(phases: Phase 1)"));
    }

    #[test]
    fn test_names_phases_in_attachment_order() {
        let phases = vec![
            snapshot("Design", &[TodoStatus::InProgress]),
            snapshot("Build", &[TodoStatus::Done]),
            snapshot("Ship", &[TodoStatus::Todo, TodoStatus::Todo]),
        ];
        let err = can_mark_done(&phases).unwrap_err();
        assert_eq!(err.phases, vec!["Design", "Ship"]);
        assert_eq!(err.incomplete, 3);
        assert_eq!(err.total, 4);
    }

    #[test]
    fn test_vacuously_complete() {
        assert!(can_mark_done(&[]).is_ok());
        assert!(can_mark_done(&[snapshot("Empty", &[])]).is_ok());
    }

    #[test]
    fn test_blocked_phase_status_is_irrelevant() {
        let phases =
            vec![PhaseSnapshot::new("Held", PhaseStatus::Blocked, vec![TodoStatus::Done])];
        assert!(can_mark_done(&phases).is_ok());
    }

    #[test]
    fn test_only_transition_into_done_is_checked() {
        let open = vec![snapshot("Phase 1", &[TodoStatus::Todo])];
        assert!(guard_transition(TaskStatus::InProgress, TaskStatus::Done, &open).is_err());
        assert!(guard_transition(TaskStatus::Done, TaskStatus::Done, &open).is_ok());
        assert!(guard_transition(TaskStatus::Done, TaskStatus::InProgress, &open).is_ok());
        assert!(guard_transition(TaskStatus::Todo, TaskStatus::InProgress, &open).is_ok());
    }
}
