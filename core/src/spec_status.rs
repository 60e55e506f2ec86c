//! Derivation of a spec's effective status from its manual status and the
//! tasks assigned to it. Never stored: recomputed on every read.

use crate::models::{EffectiveSpecStatus, SpecManualStatus};

/// Derivation table:
///
/// | manual_status | task_count | done_count    | effective_status |
/// |----------------|-----------|---------------|-------------------|
/// | cancelled       | any       | any           | cancelled         |
/// | none            | 0         | -             | draft             |
/// | none            | > 0       | < task_count  | active            |
/// | none            | > 0       | == task_count | done              |
pub fn derive(
    manual_status: Option<SpecManualStatus>,
    task_count: u64,
    done_count: u64,
) -> EffectiveSpecStatus {
    if manual_status == Some(SpecManualStatus::Cancelled) {
        return EffectiveSpecStatus::Cancelled;
    }
    if task_count == 0 {
        return EffectiveSpecStatus::Draft;
    }
    if done_count >= task_count {
        EffectiveSpecStatus::Done
    } else {
        EffectiveSpecStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_wins_regardless_of_counts() {
        assert_eq!(
            derive(Some(SpecManualStatus::Cancelled), 5, 5),
            EffectiveSpecStatus::Cancelled
        );
        assert_eq!(
            derive(Some(SpecManualStatus::Cancelled), 0, 0),
            EffectiveSpecStatus::Cancelled
        );
    }

    #[test]
    fn no_tasks_is_draft() {
        assert_eq!(derive(None, 0, 0), EffectiveSpecStatus::Draft);
    }

    #[test]
    fn some_done_is_active() {
        assert_eq!(derive(None, 4, 1), EffectiveSpecStatus::Active);
    }

    #[test]
    fn all_done_is_done() {
        assert_eq!(derive(None, 4, 4), EffectiveSpecStatus::Done);
    }

    #[test]
    fn done_count_never_exceeds_task_count_but_derivation_is_defensive() {
        assert_eq!(derive(None, 2, 3), EffectiveSpecStatus::Done);
    }
}
