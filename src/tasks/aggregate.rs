//! Phase status aggregation.
//!
//! A phase's status follows its todos unless it has been pinned to `blocked`.

use crate::tasks::models::{PhaseStatus, TodoStatus};

/// Derive a phase status from its todos.
///
/// Returns `None` for an empty phase; the caller keeps whatever is stored.
#[must_use]
pub fn derive_status(todos: &[TodoStatus]) -> Option<PhaseStatus> {
    if todos.is_empty() {
        return None;
    }

    if todos.iter().all(|t| t.is_done()) {
        Some(PhaseStatus::Completed)
    } else if todos.iter().any(|t| matches!(t, TodoStatus::Done | TodoStatus::InProgress)) {
        Some(PhaseStatus::InProgress)
    } else {
        Some(PhaseStatus::NotStarted)
    }
}

/// The status a phase should move to, if any.
///
/// `blocked` is sticky: only a manual phase update clears it.
#[must_use]
pub fn reconcile(current: PhaseStatus, todos: &[TodoStatus]) -> Option<PhaseStatus> {
    if current == PhaseStatus::Blocked {
        return None;
    }
    derive_status(todos).filter(|derived| *derived != current)
}

/// Audit text for a phase status change.
#[must_use]
pub fn phase_change_text(name: &str, old: PhaseStatus, new: PhaseStatus) -> String {
    format!("Phase '{name}' status changed from '{old}' to '{new}'")
}
